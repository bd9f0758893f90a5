//! Interactive command loop

use anyhow::Result;
use app_core::{AppError, ViewerSession};
use app_imaging::{Composite, LoadState, Payload};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// One-letter commands read from stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Next,
    Previous,
    First,
    Last,
    Info,
    Stats,
    Help,
    Quit,
}

impl Command {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "n" | "" => Some(Command::Next),
            "p" => Some(Command::Previous),
            "f" => Some(Command::First),
            "l" => Some(Command::Last),
            "i" => Some(Command::Info),
            "s" => Some(Command::Stats),
            "h" | "?" => Some(Command::Help),
            "q" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Outcome of a navigation step as far as the terminal is concerned
#[derive(Debug)]
enum Shown {
    Image(Arc<Composite>),
    /// Cursor moved onto an image that cannot be shown
    Missing(String),
    /// Already at the end in that direction
    Edge,
}

/// Recoverable errors (file vanished since listing) become "no image";
/// the user can still navigate away.
fn settle(result: Result<Option<Arc<Composite>>, AppError>) -> Result<Shown, AppError> {
    match result {
        Ok(Some(composite)) => Ok(Shown::Image(composite)),
        Ok(None) => Ok(Shown::Edge),
        Err(e) if e.is_recoverable() => {
            tracing::warn!("No image at cursor: {}", e);
            Ok(Shown::Missing(e.user_message()))
        }
        Err(e) => Err(e),
    }
}

const HELP: &str = "n/<enter> next  p previous  f first  l last  i exif  s stats  q quit";

/// Show the current image, then execute commands until `q` or end of input
pub fn run(session: &mut ViewerSession) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match settle(session.show_current())? {
        Shown::Edge => {
            writeln!(out, "No images to show.")?;
            return Ok(());
        }
        shown => report(&mut out, session, shown)?,
    }
    writeln!(out, "{}", HELP)?;

    for line in io::stdin().lock().lines() {
        let Some(command) = Command::parse(&line?) else {
            writeln!(out, "{}", HELP)?;
            continue;
        };

        let shown = match command {
            Command::Next => settle(session.next())?,
            Command::Previous => settle(session.previous())?,
            Command::First => settle(session.first())?,
            Command::Last => settle(session.last())?,
            Command::Info => {
                print_exif(&mut out, session.imaging().loader().current())?;
                continue;
            }
            Command::Stats => {
                writeln!(out, "{:?}", session.imaging().loader().stats())?;
                continue;
            }
            Command::Help => {
                writeln!(out, "{}", HELP)?;
                continue;
            }
            Command::Quit => break,
        };

        report(&mut out, session, shown)?;
    }

    Ok(())
}

fn report(out: &mut impl Write, session: &ViewerSession, shown: Shown) -> io::Result<()> {
    match shown {
        Shown::Image(composite) => print_summary(out, session, &composite),
        Shown::Missing(message) => {
            let (index, count) = session.navigator().position();
            writeln!(out, "[{}/{}] no image: {}", index, count, message)
        }
        Shown::Edge => writeln!(out, "(no further image in that direction)"),
    }
}

fn print_summary(out: &mut impl Write, session: &ViewerSession, composite: &Composite) -> io::Result<()> {
    let (index, count) = session.navigator().position();

    let content = match (composite.state(), &*composite.payload()) {
        (LoadState::Complete, Some(Payload::Raster(img))) => format!(
            "{}x{} raster{}",
            img.width,
            img.height,
            if composite.is_grayscale() { ", grayscale" } else { "" }
        ),
        (LoadState::Complete, Some(Payload::Vector(drawing))) => {
            format!("{}x{} vector", drawing.width, drawing.height)
        }
        (state, _) => format!("no image ({:?})", state),
    };

    writeln!(
        out,
        "[{}/{}] {}  {}  {}  {:.1} ms (est. {:.1} ms)",
        index,
        count,
        composite.path(),
        composite.format(),
        content,
        composite.elapsed_ms(),
        composite.estimated_ms()
    )
}

fn print_exif(out: &mut impl Write, current: Option<Arc<Composite>>) -> io::Result<()> {
    let lines = current
        .as_ref()
        .and_then(|c| c.exif())
        .filter(|exif| exif.has_data())
        .map(|exif| exif.to_lines())
        .unwrap_or_default();

    if lines.is_empty() {
        return writeln!(out, "(no EXIF data)");
    }

    for line in lines {
        writeln!(out, "  {}", line)?;
    }
    Ok(())
}
