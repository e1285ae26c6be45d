//! Server-side word filter.
//!
//! Matching is case-insensitive plain substring — no word boundaries.
//! A word list entry can therefore match inside a longer word, and a
//! later word can re-mask a region already masked by an earlier one.
//! Both behaviors are part of the service contract.

/// Case-fold a single char without changing the char count, so mask
/// offsets stay aligned with the original text.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Replace every case-insensitive occurrence of each word with a run
/// of `*` of the same length. Words are applied in list order over the
/// already-modified text; occurrences of a single word do not overlap
/// (the scan resumes after each match).
pub fn filter(text: &str, words: &[String]) -> String {
    if words.is_empty() {
        return text.to_string();
    }

    let mut chars: Vec<char> = text.chars().collect();

    for word in words {
        let needle: Vec<char> = word.chars().map(fold).collect();
        if needle.is_empty() || needle.len() > chars.len() {
            continue;
        }

        let mut i = 0;
        while i + needle.len() <= chars.len() {
            let hit = chars[i..i + needle.len()]
                .iter()
                .map(|&c| fold(c))
                .eq(needle.iter().copied());

            if hit {
                for c in &mut chars[i..i + needle.len()] {
                    *c = '*';
                }
                i += needle.len();
            } else {
                i += 1;
            }
        }
    }

    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::filter;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn masks_single_word() {
        assert_eq!(filter("hello world", &words(&["hello"])), "***** world");
    }

    #[test]
    fn masks_repeated_occurrences() {
        assert_eq!(filter("aabbaa", &words(&["aa"])), "**bb**");
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(filter("Hello HELLO hello", &words(&["hello"])), "***** ***** *****");
    }

    #[test]
    fn substring_match_inside_words() {
        // No word boundaries: "ass" matches inside "classic".
        assert_eq!(filter("classic", &words(&["ass"])), "cl***ic");
    }

    #[test]
    fn words_applied_in_order_over_modified_text() {
        // "ab" masks first, then "b" catches the remaining bare b.
        assert_eq!(filter("abb", &words(&["ab", "b"])), "***");
    }

    #[test]
    fn empty_word_list_is_identity() {
        assert_eq!(filter("anything", &[]), "anything");
    }

    #[test]
    fn empty_words_are_skipped() {
        assert_eq!(filter("text", &words(&["", "ex"])), "t**t");
    }

    #[test]
    fn mask_length_counts_chars_not_bytes() {
        assert_eq!(filter("qəhbə yox", &words(&["qəhbə"])), "***** yox");
    }

    #[test]
    fn word_longer_than_text_is_skipped() {
        assert_eq!(filter("hi", &words(&["hello"])), "hi");
    }
}
