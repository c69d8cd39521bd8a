//! Parameterized replay variable substitution (spec.md §4.7 step 3, §8
//! property 4): recorded variable values are swapped for current ones by
//! literal string replacement across every message's text content.

use std::collections::HashMap;

use nav_domain::chat::ChatMessage;

/// Rewrites `history` in place: for every `(placeholder, recorded_value)`
/// pair, if `current` has a value for the same placeholder, every literal
/// occurrence of `recorded_value` in message text is replaced with the
/// current value. Order of keys does not matter since recorded values for
/// distinct placeholders are assumed not to be substrings of one another
/// in typical task text; ties are resolved by map iteration order.
pub fn substitute_variables(
    history: &mut [ChatMessage],
    recorded: &HashMap<String, String>,
    current: &HashMap<String, String>,
) {
    let replacements: Vec<(&str, &str)> = recorded
        .iter()
        .filter_map(|(key, recorded_value)| current.get(key).map(|current_value| (recorded_value.as_str(), current_value.as_str())))
        .collect();

    if replacements.is_empty() {
        return;
    }

    for message in history.iter_mut() {
        if let Some(text) = message.text_mut() {
            let mut rewritten = text.clone();
            for (from, to) in &replacements {
                rewritten = rewritten.replace(from, to);
            }
            *text = rewritten;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_values_are_replaced_with_current_ones_everywhere() {
        let mut history = vec![
            ChatMessage::user("Book flight from Boston to Seattle on Aug 10"),
            ChatMessage::assistant_text("Confirmed Boston to Seattle"),
        ];
        let recorded: HashMap<String, String> =
            [(":1".into(), "Boston".into()), (":2".into(), "Seattle".into()), (":3".into(), "Aug 10".into())].into();
        let current: HashMap<String, String> =
            [(":1".into(), "NYC".into()), (":2".into(), "SFO".into()), (":3".into(), "Sep 1".into())].into();

        substitute_variables(&mut history, &recorded, &current);

        assert_eq!(history[0].text(), Some("Book flight from NYC to SFO on Sep 1"));
        assert_eq!(history[1].text(), Some("Confirmed NYC to SFO"));
    }

    #[test]
    fn missing_current_value_leaves_recorded_text_untouched() {
        let mut history = vec![ChatMessage::user("Boston trip")];
        let recorded: HashMap<String, String> = [(":1".into(), "Boston".into())].into();
        let current: HashMap<String, String> = HashMap::new();
        substitute_variables(&mut history, &recorded, &current);
        assert_eq!(history[0].text(), Some("Boston trip"));
    }
}
