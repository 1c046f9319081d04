use std::io::Read;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use cwlib::generator::PaddingMode;
use cwlib::morse::text_to_morse;
use cwlib::sinks::{RingBufferSink, WavSink};
use cwlib::AudioSink;
use cwlib::Generator;

mod interactive;

use interactive::{decode_demo, interactive_mode, practice_mode, PracticeMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Speed in WPM (PARIS standard)
    #[arg(short, long, default_value_t = 20)]
    wpm: u32,

    /// Tone frequency in Hz
    #[arg(short, long, default_value_t = 700)]
    tone: i32,

    /// Extra Farnsworth gap in dot-units
    #[arg(short, long, default_value_t = 0)]
    gap: u32,

    /// Output mode
    #[arg(long, value_enum, default_value_t = OutputMode::Audio)]
    output: OutputMode,

    /// Read text from file instead of stdin
    #[arg(short, long)]
    file: Option<String>,

    /// Interactive straight-key mode ('.' dot, '-' dash, Space word gap, Esc quits)
    #[arg(short, long)]
    interactive: bool,

    /// Practice mode (random words, callsigns, Q-codes, numbers)
    #[arg(short, long, value_enum)]
    practice: Option<PracticeMode>,

    /// Custom text for practice mode
    #[arg(long, requires = "practice")]
    custom_text: Option<String>,

    /// Save audio to a WAV file instead of playing it
    #[arg(long)]
    output_file: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputMode {
    Audio,
    Text,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a dot/dash/space-separated representation read from stdin by
    /// synthesising mark timestamps and driving the receiver state machine.
    Decode {
        #[arg(short, long, default_value_t = 20)]
        wpm: u32,
    },
}

fn print_morse(text: &str) -> Result<()> {
    println!("{}", text_to_morse(text)?);
    Ok(())
}

fn build_generator(args: &Args) -> Result<Generator> {
    let sink: Box<dyn AudioSink> = if args.output_file.is_some() {
        Box::new(WavSink::new(8_000, 512))
    } else {
        Box::new(RingBufferSink::default())
    };
    let mut generator = Generator::new(sink, cwlib::queue::TQ_CAPACITY_DEFAULT, PaddingMode::SilentPad);
    generator.set_frequency(args.tone)?;
    generator.set_speed(args.wpm)?;
    generator.set_gap(args.gap)?;
    Ok(generator)
}

fn send_text(args: &Args, text: &str) -> Result<()> {
    let mut generator = build_generator(args)?;
    let device = args.output_file.as_deref().unwrap_or("default");
    generator.start(device)?;
    generator.send_string(text)?;
    generator.queue().wait_for_drained();
    generator.stop();
    if let Some(path) = &args.output_file {
        println!("Saved morse code to: {path}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    validate_args(&args)?;

    if let Some(Command::Decode { wpm }) = args.command {
        return decode_demo(wpm);
    }

    if let Some(mode) = args.practice {
        return practice_mode(&args, mode, args.custom_text.as_deref());
    }

    if args.interactive {
        return interactive_mode(&args);
    }

    let text = if let Some(path) = &args.file {
        std::fs::read_to_string(path)?
    } else {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    };

    match args.output {
        OutputMode::Text => print_morse(&text),
        OutputMode::Audio => send_text(&args, &text),
    }
}

fn validate_args(args: &Args) -> Result<()> {
    use cwlib::timing::{SPEED_MAX_WPM, SPEED_MIN_WPM};
    if !(SPEED_MIN_WPM..=SPEED_MAX_WPM).contains(&args.wpm) {
        anyhow::bail!("speed {} WPM out of range {}-{}", args.wpm, SPEED_MIN_WPM, SPEED_MAX_WPM);
    }
    Ok(())
}
