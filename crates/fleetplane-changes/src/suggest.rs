//! Query completions drawn from the indexed fields of current resources

use crate::query::Query;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A completed query and the text to show for it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Suggestion {
    pub query: String,
    pub label: String,
}

/// Completions for the last token of `query`.
///
/// A token without `:` completes to field names (`name:`); `field:prefix`
/// completes to values of that field seen in `index`. Results are sorted and
/// deduplicated. A token that is already a complete `field:value` yields
/// nothing.
pub fn suggest<I>(query: &Query, index: I) -> Vec<Suggestion>
where
    I: IntoIterator<Item = Vec<(String, String)>>,
{
    let Some(token) = query.last_token() else {
        return Vec::new();
    };
    let (negation, body) = match token.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", token),
    };

    let labels: BTreeSet<String> = match body.split_once(':') {
        Some((field, prefix)) => {
            let prefix = prefix.to_ascii_lowercase();
            index
                .into_iter()
                .flatten()
                .filter(|(name, value)| {
                    name.eq_ignore_ascii_case(field) && value.to_ascii_lowercase().starts_with(&prefix)
                })
                .filter(|(_, value)| !value.eq_ignore_ascii_case(&prefix))
                .map(|(name, value)| format!("{}:{}", name, value))
                .collect()
        }
        None => {
            let prefix = body.to_ascii_lowercase();
            index
                .into_iter()
                .flatten()
                .map(|(name, _)| name)
                .filter(|name| name.to_ascii_lowercase().starts_with(&prefix))
                .map(|name| format!("{}:", name))
                .collect()
        }
    };

    labels
        .into_iter()
        .map(|label| Suggestion {
            query: query.with_last_token(&format!("{}{}", negation, label)),
            label,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> Vec<Vec<(String, String)>> {
        vec![
            vec![
                ("name".into(), "web-01".into()),
                ("os".into(), "linux".into()),
            ],
            vec![
                ("name".into(), "win-01".into()),
                ("os".into(), "windows".into()),
            ],
        ]
    }

    #[test]
    fn completes_field_names() {
        let s = suggest(&Query::parse("n"), index());
        assert_eq!(
            s,
            vec![Suggestion {
                query: "name:".into(),
                label: "name:".into()
            }]
        );
    }

    #[test]
    fn completes_field_values_keeping_the_rest() {
        let s = suggest(&Query::parse("web -os:"), index());
        let queries: Vec<&str> = s.iter().map(|s| s.query.as_str()).collect();
        assert_eq!(queries, vec!["web -os:linux", "web -os:windows"]);
        assert_eq!(s[0].label, "os:linux");
    }

    #[test]
    fn complete_or_trailing_tokens_yield_nothing() {
        assert!(suggest(&Query::parse("os:linux"), index()).is_empty());
        assert!(suggest(&Query::parse("os:linux "), index()).is_empty());
        assert!(suggest(&Query::parse(""), index()).is_empty());
    }
}
