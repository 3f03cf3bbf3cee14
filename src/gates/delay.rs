//! DELAY lines.
//!
//! A DELAY samples its input once per evaluation, when the evaluation
//! advances, and holds its output constant while the circuit settles. A line
//! of capacity `n` therefore reproduces its settled input `n` evaluations
//! later.

use crate::gate::DelayLine;

/// Advances `line` by one sample and returns the updated line together with
/// its new output.
pub fn shift(line: &DelayLine, input: bool) -> (DelayLine, bool) {
    let mut next = line.clone();
    let output = next.shift(input);
    (next, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_three_sequence() {
        let mut line = DelayLine::new(3);
        let mut outputs = Vec::new();

        for input in [true, true, true, false, false] {
            let (next, out) = shift(&line, input);
            line = next;
            outputs.push(out);
        }

        // The fourth output carries the first input
        assert!(outputs[3]);

        // Once the history is all low the output is low
        for _ in 0..3 {
            let (next, _) = shift(&line, false);
            line = next;
        }
        assert_eq!(line.history().collect::<Vec<_>>(), vec![false, false, false]);
        assert!(!line.output());
    }

    #[test]
    fn test_shift_is_pure() {
        let line = DelayLine::new(2);
        let (next, _) = shift(&line, true);
        assert_ne!(line, next);
        assert_eq!(line, DelayLine::new(2));
    }
}
