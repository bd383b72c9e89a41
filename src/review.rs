//! Manual curation hooks.
//!
//! Steps that ask a human to accept or reject candidates (clean segments,
//! IEDs to validate) take a [`Reviewer`] instead of reading the terminal
//! themselves.  The binaries plug in a [`TerminalPrompt`]; tests and
//! unattended runs use [`AcceptAll`] or a closure wrapped with [`review_fn`].
use std::io::{BufRead, Write};

use ndarray::{ArrayView2, Axis};

/// Answer to one review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Reject,
    /// Reject this candidate and end the review.
    Stop,
}

/// Decides whether a candidate is kept.
///
/// `data` is the `[C, T]` excerpt the candidate covers.
pub trait Reviewer<T> {
    fn review(&mut self, item: &T, data: ArrayView2<'_, f64>) -> Verdict;
}

/// Keeps every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<T> Reviewer<T> for AcceptAll {
    fn review(&mut self, _item: &T, _data: ArrayView2<'_, f64>) -> Verdict {
        Verdict::Keep
    }
}

/// Adapts a closure into a [`Reviewer`]; see [`review_fn`].
pub struct FnReviewer<F>(F);

/// Wrap a closure as a [`Reviewer`].
///
/// ```
/// use iedkit::review::{review_fn, Reviewer, Verdict};
/// use ndarray::Array2;
///
/// let mut short_only = review_fn(|len: &usize, _data| {
///     if *len < 10 { Verdict::Keep } else { Verdict::Reject }
/// });
/// let data = Array2::<f64>::zeros((1, 4));
/// assert_eq!(short_only.review(&4usize, data.view()), Verdict::Keep);
/// ```
pub fn review_fn<T, F>(f: F) -> FnReviewer<F>
where
    F: FnMut(&T, ArrayView2<'_, f64>) -> Verdict,
{
    FnReviewer(f)
}

impl<T, F> Reviewer<T> for FnReviewer<F>
where
    F: FnMut(&T, ArrayView2<'_, f64>) -> Verdict,
{
    fn review(&mut self, item: &T, data: ArrayView2<'_, f64>) -> Verdict {
        (self.0)(item, data)
    }
}

impl<T, R: Reviewer<T> + ?Sized> Reviewer<T> for &mut R {
    fn review(&mut self, item: &T, data: ArrayView2<'_, f64>) -> Verdict {
        (**self).review(item, data)
    }
}

/// Asks on a terminal (or any reader/writer pair).
///
/// Each candidate is printed through `describe`, followed by the
/// peak-to-peak range of every channel of its excerpt.  `o`/`y` keeps,
/// `n` rejects, `q` stops; anything else asks again.  End of input stops.
pub struct TerminalPrompt<R, W, D> {
    input: R,
    output: W,
    describe: D,
}

impl<R: BufRead, W: Write, D> TerminalPrompt<R, W, D> {
    pub fn new(input: R, output: W, describe: D) -> Self {
        Self { input, output, describe }
    }

    fn ask(&mut self) -> std::io::Result<Verdict> {
        loop {
            write!(self.output, "keep? [o/n/q] ")?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Verdict::Stop);
            }
            match line.trim().to_lowercase().as_str() {
                "o" | "oui" | "y" | "yes" => return Ok(Verdict::Keep),
                "n" | "non" | "no" => return Ok(Verdict::Reject),
                "q" | "quit" => return Ok(Verdict::Stop),
                other => writeln!(self.output, "unrecognised answer '{other}'")?,
            }
        }
    }
}

impl<T, R, W, D> Reviewer<T> for TerminalPrompt<R, W, D>
where
    R: BufRead,
    W: Write,
    D: FnMut(&T) -> String,
{
    fn review(&mut self, item: &T, data: ArrayView2<'_, f64>) -> Verdict {
        let header = (self.describe)(item);
        let shown = writeln!(self.output, "{header}").and_then(|_| {
            for (c, row) in data.axis_iter(Axis(0)).enumerate() {
                let lo = row.iter().copied().fold(f64::INFINITY, f64::min);
                let hi = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                writeln!(self.output, "  ch{c:<3} p-p {:.3}", hi - lo)?;
            }
            Ok(())
        });
        match shown.and_then(|_| self.ask()) {
            Ok(verdict) => verdict,
            Err(e) => {
                log::warn!("review prompt failed: {e}");
                Verdict::Stop
            }
        }
    }
}
