/// Replaces bracketed sound effects like `[soft whoosh]` with a space so they
/// are not read out loud.
///
/// Matching is non-greedy and stops at line breaks; an unclosed bracket is kept as is.
pub fn strip_sound_effects(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        let (before, from_bracket) = rest.split_at(open);
        out.push_str(before);

        let tail = &from_bracket[1..];
        let close = tail.find(']');
        let newline = tail.find(['\n', '\r']);
        match close {
            Some(close) if newline.is_none_or(|newline| close < newline) => {
                out.push(' ');
                rest = &tail[close + 1..];
            }
            _ => {
                out.push('[');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_each_effect() {
        assert_eq!(
            strip_sound_effects("He followed the path! [twinkle twinkle] Yummy [slurp]!"),
            "He followed the path!   Yummy  !"
        );
    }

    #[test]
    fn test_text_without_effects_is_unchanged() {
        let text = "Once upon a time, Abood the little bear 🐻 was in a sparkly forest ✨.";
        assert_eq!(strip_sound_effects(text), text);
    }

    #[test]
    fn test_unclosed_and_multiline_brackets_are_kept() {
        assert_eq!(strip_sound_effects("a [b"), "a [b");
        assert_eq!(strip_sound_effects("a [b\nc] d"), "a [b\nc] d");
        assert_eq!(strip_sound_effects("[x] [y\nz]"), "  [y\nz]");
    }
}
