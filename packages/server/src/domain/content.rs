//! Inspection of message content before it is relayed.
//!
//! Users must not exchange contact details outside the platform, so messages
//! carrying an email address or a phone-number-like run of digits are filtered.

/// Minimum digits in a run (separators allowed) treated as a phone number
const PHONE_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentVerdict {
    Accepted,
    /// Blank content; answered with `message_error`
    Empty,
    /// Contact details found; answered with `message_filtered`
    ContactDetails,
}

pub fn inspect_content(content: &str) -> ContentVerdict {
    if content.trim().is_empty() {
        return ContentVerdict::Empty;
    }
    if content.split_whitespace().any(looks_like_email) || has_phone_number(content) {
        return ContentVerdict::ContactDetails;
    }
    ContentVerdict::Accepted
}

fn looks_like_email(word: &str) -> bool {
    let Some((local, domain)) = word.split_once('@') else {
        return false;
    };
    let domain = domain.trim_end_matches(|c: char| !c.is_alphanumeric());
    !local.is_empty()
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && tld.len() >= 2)
}

fn has_phone_number(content: &str) -> bool {
    let mut digits = 0;
    for c in content.chars() {
        if c.is_ascii_digit() {
            digits += 1;
            if digits >= PHONE_DIGITS {
                return true;
            }
        } else if !(digits > 0 && matches!(c, ' ' | '-' | '.' | '(' | ')' | '+')) {
            digits = 0;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_content_is_accepted() {
        // テスト項目: 通常のメッセージは受け付けられる（短い数字や @ 単体を含む）
        // given (前提条件):
        let contents = ["Hello!", "The deadline is 12 May, 2 pm", "ping @team"];

        // when (操作):
        let verdicts: Vec<ContentVerdict> = contents.iter().map(|c| inspect_content(c)).collect();

        // then (期待する結果):
        assert!(verdicts.iter().all(|v| *v == ContentVerdict::Accepted));
    }

    #[test]
    fn test_blank_content_is_empty() {
        // テスト項目: 空白のみのメッセージは Empty になる
        // given (前提条件):
        let content = "   \n";

        // when (操作):
        let verdict = inspect_content(content);

        // then (期待する結果):
        assert_eq!(verdict, ContentVerdict::Empty);
    }

    #[test]
    fn test_contact_details_are_detected() {
        // テスト項目: メールアドレスや電話番号を含むメッセージは ContactDetails になる
        // given (前提条件):
        let contents = [
            "write me at aiko@example.com.",
            "call 090-1234-5678 tonight",
            "+81 (90) 1234 5678",
        ];

        // when (操作):
        let verdicts: Vec<ContentVerdict> = contents.iter().map(|c| inspect_content(c)).collect();

        // then (期待する結果):
        assert!(verdicts.iter().all(|v| *v == ContentVerdict::ContactDetails));
    }
}
