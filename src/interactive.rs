use std::io::Read;
use std::time::Duration;

use anyhow::Result;
use clap::ValueEnum;
use crossterm::event::{self, Event, KeyCode};

use cwlib::receiver::Receiver;
use cwlib::{KeyState, StraightKey};

use crate::{build_generator, Args};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PracticeMode {
    RandomWords,
    Callsigns,
    QCodes,
    Numbers,
    Custom,
}

impl PracticeMode {
    pub fn get_content(&self, custom_text: Option<&str>) -> Vec<String> {
        match self {
            PracticeMode::RandomWords => [
                "THE", "QUICK", "BROWN", "FOX", "JUMPS", "OVER", "LAZY", "DOG",
                "PARIS", "MORSE", "HAM", "RADIO", "SIGNAL", "CODE",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            PracticeMode::Callsigns => [
                "W1AW", "K2ABC", "N3XYZ", "W4DEF", "K5GHI", "N6JKL", "W7MNO", "K8PQR", "N9STU",
                "VE3ABC", "G4HAM",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            PracticeMode::QCodes => [
                "QTH", "QRZ", "QSL", "QRM", "QRN", "QRP", "QRQ", "QRS", "QRT", "QRU", "QRV",
                "QSB", "QSY", "QSO",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            PracticeMode::Numbers => [
                "123", "456", "789", "012", "345", "678", "901", "234", "567", "890", "73", "88",
                "55",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            PracticeMode::Custom => match custom_text {
                Some(text) => text.split_whitespace().map(|s| s.to_string()).collect(),
                None => ["CQ", "DE", "TEST"].iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

/// Keystrokes drive a [`StraightKey`] through the public [`cwlib::Generator`]
/// API instead of calling into an audio library directly: `.` sends a dot,
/// `-` sends a dash, Space is a word gap, Esc quits. Each keystroke is a
/// key-down held for the appropriate dot/dash duration followed by a
/// key-up, so the tone queue and worker thread are exercised the same way a
/// hardware key would drive them.
pub fn interactive_mode(args: &Args) -> Result<()> {
    let mut generator = build_generator(args)?;
    generator.start("default")?;

    let timings = cwlib::timing::derive_generator_timings(args.wpm, args.gap, 50);
    let dot = Duration::from_micros(timings.dot_ideal_us as u64);
    let dash = Duration::from_micros(timings.dash_ideal_us as u64);
    let word_gap = Duration::from_micros(timings.eow_delay_us as u64);
    let release = Duration::from_micros(timings.eoe_delay_us.min(5_000) as u64);

    let mut key = StraightKey::new(generator.queue(), args.tone, release);

    println!("Interactive straight key - '.' dot, '-' dash, Space word gap, Esc quits:\n");
    loop {
        if let Event::Key(k) = event::read()? {
            match k.code {
                KeyCode::Esc => break,
                KeyCode::Char('.') => key_down_for(&mut key, dot)?,
                KeyCode::Char('-') => key_down_for(&mut key, dash)?,
                KeyCode::Char(' ') => std::thread::sleep(word_gap),
                _ => {}
            }
        }
    }

    generator.queue().wait_for_drained();
    generator.stop();
    Ok(())
}

fn key_down_for(key: &mut StraightKey, hold: Duration) -> Result<()> {
    key.notify(KeyState::Closed)?;
    std::thread::sleep(hold);
    key.notify(KeyState::Open)?;
    Ok(())
}

pub fn practice_mode(args: &Args, mode: PracticeMode, custom_text: Option<&str>) -> Result<()> {
    let content = mode.get_content(custom_text);
    println!("Practice mode - {} words available", content.len());
    println!("Press Space for next, R to repeat, Esc to quit:\n");

    let mut generator = build_generator(args)?;
    generator.start("default")?;

    let mut current_index = 0;
    loop {
        let word = &content[current_index];
        println!("Current: {word}");
        println!("Morse: {}", cwlib::morse::text_to_morse(word)?);
        generator.send_string(word)?;
        generator.queue().wait_for_drained();

        match event::read()? {
            Event::Key(k) => match k.code {
                KeyCode::Esc => break,
                KeyCode::Char(' ') => current_index = (current_index + 1) % content.len(),
                KeyCode::Char('r') | KeyCode::Char('R') => println!("Repeating: {word}"),
                _ => {}
            },
            _ => {}
        }
    }

    generator.stop();
    Ok(())
}

/// Reads a dot/dash/space-separated representation from stdin (the same
/// format [`cwlib::morse::text_to_morse`] produces: symbols run together
/// within a character, a space between characters, `/` between words),
/// synthesises mark timestamps at `wpm`, and drives them through the
/// receiver state machine to recover the original text.
pub fn decode_demo(wpm: u32) -> Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let mut receiver = Receiver::new(wpm as f64, 50, 0, false, 0);
    let t = receiver.timings();
    let (dot_us, dash_us, eom_us, eoc_min_us, eoc_max_us) =
        (t.dot.ideal_us, t.dash.ideal_us, t.eom.ideal_us, t.eoc.min_us, t.eoc.max_us);

    let mut clock_us: i64 = 0;
    let mut output = String::new();

    for token in input.split_whitespace() {
        if token == "/" {
            clock_us += eoc_max_us + 1;
            continue;
        }

        let symbols: Vec<char> = token.chars().collect();
        for (i, &symbol) in symbols.iter().enumerate() {
            receiver.mark_begin(Some(Duration::from_micros(clock_us as u64)))?;
            clock_us += match symbol {
                '.' => dot_us,
                '-' => dash_us,
                other => {
                    eprintln!("skipping unrecognised symbol '{other}'");
                    continue;
                }
            };
            receiver.mark_end(Some(Duration::from_micros(clock_us as u64)))?;
            if i + 1 != symbols.len() {
                clock_us += eom_us;
            }
        }

        clock_us += eoc_min_us.max(eom_us);
        match receiver.poll_character(Some(Duration::from_micros(clock_us as u64))) {
            Ok((ch, _)) => output.push(ch),
            Err(e) => eprintln!("could not decode '{token}': {e}"),
        }
    }

    println!("{output}");
    Ok(())
}
