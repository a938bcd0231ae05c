//! Solver for the publish verification challenge: an obfuscated sentence
//! whose spelled-out numbers must be summed.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Unit,
    Teen,
    Tens,
    Hundred,
    Scale,
}

fn number_word(word: &str) -> Option<(Kind, u64)> {
    let entry = match word {
        "zero" => (Kind::Unit, 0),
        "one" => (Kind::Unit, 1),
        "two" => (Kind::Unit, 2),
        "three" => (Kind::Unit, 3),
        "four" => (Kind::Unit, 4),
        "five" => (Kind::Unit, 5),
        "six" => (Kind::Unit, 6),
        "seven" => (Kind::Unit, 7),
        "eight" => (Kind::Unit, 8),
        "nine" => (Kind::Unit, 9),
        "ten" => (Kind::Teen, 10),
        "eleven" => (Kind::Teen, 11),
        "twelve" => (Kind::Teen, 12),
        "thirteen" => (Kind::Teen, 13),
        "fourteen" => (Kind::Teen, 14),
        "fifteen" => (Kind::Teen, 15),
        "sixteen" => (Kind::Teen, 16),
        "seventeen" => (Kind::Teen, 17),
        "eighteen" => (Kind::Teen, 18),
        "nineteen" => (Kind::Teen, 19),
        "twenty" => (Kind::Tens, 20),
        "thirty" => (Kind::Tens, 30),
        "forty" => (Kind::Tens, 40),
        "fifty" => (Kind::Tens, 50),
        "sixty" => (Kind::Tens, 60),
        "seventy" => (Kind::Tens, 70),
        "eighty" => (Kind::Tens, 80),
        "ninety" => (Kind::Tens, 90),
        "hundred" => (Kind::Hundred, 100),
        "thousand" => (Kind::Scale, 1_000),
        "million" => (Kind::Scale, 1_000_000),
        _ => return None,
    };
    Some(entry)
}

/// Accumulates one spelled-out number ("three hundred twenty one").
#[derive(Default)]
struct Phrase {
    total: u64,
    current: u64,
    last: Option<Kind>,
}

impl Phrase {
    /// Whether `kind` continues the number being read rather than starting
    /// a new one ("twenty three" continues, "five six" does not).
    fn continues(&self, kind: Kind) -> bool {
        matches!(
            (self.last, kind),
            (None, _)
                | (Some(Kind::Tens), Kind::Unit)
                | (
                    Some(Kind::Hundred | Kind::Scale),
                    Kind::Unit | Kind::Teen | Kind::Tens
                )
                | (Some(Kind::Unit | Kind::Teen | Kind::Tens), Kind::Hundred)
                | (
                    Some(Kind::Unit | Kind::Teen | Kind::Tens | Kind::Hundred),
                    Kind::Scale
                )
        )
    }

    fn push(&mut self, kind: Kind, value: u64) {
        match kind {
            Kind::Unit | Kind::Teen | Kind::Tens => self.current += value,
            Kind::Hundred => self.current = self.current.max(1) * value,
            Kind::Scale => {
                self.total += self.current.max(1) * value;
                self.current = 0;
            }
        }
        self.last = Some(kind);
    }

    fn value(&self) -> Option<u64> {
        self.last.map(|_| self.total + self.current)
    }
}

fn flush(phrase: &mut Phrase, numbers: &mut Vec<f64>) {
    if let Some(v) = phrase.value() {
        #[allow(clippy::cast_precision_loss)]
        numbers.push(v as f64);
    }
    *phrase = Phrase::default();
}

/// Every number in `text`, spelled out or written as digits, in order.
#[must_use]
pub fn extract_numbers(text: &str) -> Vec<f64> {
    let cleaner = Regex::new(r"[^a-z0-9. ]+").expect("valid cleaner regex");
    let lowered = text.to_lowercase();
    let cleaned = cleaner.replace_all(&lowered, " ");

    let mut numbers = Vec::new();
    let mut phrase = Phrase::default();

    for raw in cleaned.split_whitespace() {
        let word = raw.trim_matches('.');
        if let Some((kind, value)) = number_word(word) {
            if !phrase.continues(kind) {
                flush(&mut phrase, &mut numbers);
            }
            phrase.push(kind, value);
            continue;
        }
        if word == "and" && matches!(phrase.last, Some(Kind::Hundred | Kind::Scale)) {
            continue;
        }
        flush(&mut phrase, &mut numbers);
        if let Ok(n) = word.parse::<f64>() {
            if n.is_finite() {
                numbers.push(n);
            }
        }
    }
    flush(&mut phrase, &mut numbers);
    numbers
}

/// The challenge answer: the sum of every number, to two decimals.
/// `None` when the text contains no numbers at all.
#[must_use]
pub fn solve(challenge: &str) -> Option<String> {
    let numbers = extract_numbers(challenge);
    if numbers.is_empty() {
        return None;
    }
    let sum: f64 = numbers.iter().sum();
    Some(format!("{sum:.2}"))
}
