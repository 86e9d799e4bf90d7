//! Step input expressions, parsed once when a definition is loaded.

use rand::Rng;
use serde_json::Value;

use crate::extract::extract;

const RANDOM_PREFIX: &str = "$random(";
const PATH_PREFIX: &str = "$.";
const FALLBACK_RANGE: (i64, i64) = (1_000_000_000, 9_999_999_999);

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Passed through unchanged.
    Literal(Value),
    /// `$random(lo,hi)`, an inclusive random integer rendered as text.
    RandomRange { lo: i64, hi: i64 },
    /// `$.path` into the running workflow context.
    PathLookup(String),
}

impl Expression {
    pub fn parse(value: &Value) -> Self {
        let Some(text) = value.as_str() else {
            return Expression::Literal(value.clone());
        };
        let text = text.trim();

        if let Some(inner) = text.strip_prefix(RANDOM_PREFIX).and_then(|rest| rest.strip_suffix(')')) {
            let (lo, hi) = Self::random_bounds(inner).unwrap_or(FALLBACK_RANGE);
            return Expression::RandomRange {
                lo,
                hi,
            };
        }
        if let Some(path) = text.strip_prefix(PATH_PREFIX) {
            return Expression::PathLookup(path.to_string());
        }
        Expression::Literal(value.clone())
    }

    fn random_bounds(inner: &str) -> Option<(i64, i64)> {
        let (lo, hi) = inner.split_once(',')?;
        let lo: i64 = lo.trim().parse().ok()?;
        let hi: i64 = hi.trim().parse().ok()?;
        (lo <= hi).then_some((lo, hi))
    }

    /// Evaluates against a context shaped `{"params": .., "steps": {name: {params, extracted, data}}}`.
    pub fn resolve(
        &self,
        context: &Value,
    ) -> Value {
        match self {
            Expression::Literal(value) => value.clone(),
            Expression::RandomRange {
                lo,
                hi,
            } => Value::String(rand::rng().random_range(*lo..=*hi).to_string()),
            Expression::PathLookup(path) => extract(context, path),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::Expression;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Expression::parse(&json!(" $random(1, 5) ")), Expression::RandomRange { lo: 1, hi: 5 });
        assert_eq!(Expression::parse(&json!("$.params.q")), Expression::PathLookup("params.q".to_string()));
        assert_eq!(Expression::parse(&json!("plain")), Expression::Literal(json!("plain")));
        assert_eq!(Expression::parse(&json!(42)), Expression::Literal(json!(42)));
        assert_eq!(Expression::parse(&json!({"a": "$.params.q"})), Expression::Literal(json!({"a": "$.params.q"})));
    }

    #[test]
    fn test_malformed_random_falls_back() {
        let fallback = Expression::RandomRange {
            lo: 1_000_000_000,
            hi: 9_999_999_999,
        };
        assert_eq!(Expression::parse(&json!("$random(a,b)")), fallback);
        assert_eq!(Expression::parse(&json!("$random(5)")), fallback);
        assert_eq!(Expression::parse(&json!("$random(9,1)")), fallback);
        assert_eq!(Expression::parse(&json!("$random(1,2,3)")), fallback);
    }

    #[test]
    fn test_resolve() {
        let context = json!({"params": {"q": "rust"}, "steps": {"step1": {"extracted": {"token": "abc"}}}});
        assert_eq!(Expression::parse(&json!("$.params.q")).resolve(&context), json!("rust"));
        assert_eq!(Expression::parse(&json!("$.steps.step1.extracted.token")).resolve(&context), json!("abc"));
        assert_eq!(Expression::parse(&json!("$.steps.step2.data")).resolve(&context), json!(null));

        for _ in 0..20 {
            let value = Expression::parse(&json!("$random(3,4)")).resolve(&context);
            let n: i64 = value.as_str().unwrap().parse().unwrap();
            assert!((3..=4).contains(&n));
        }
        let wide = Expression::parse(&json!("$random(x)")).resolve(&context);
        assert_eq!(wide.as_str().unwrap().len(), 10);
    }
}
