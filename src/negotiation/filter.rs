//! Filter dialect negotiation.
//!
//! Filters are parsed but not compiled. Evaluation against event payloads
//! happens elsewhere.

use super::xpath;
use crate::error::{Result, SubscriptionError};
use crate::types::FilterSpec;

/// Dialect URI for XPath 1.0 filters.
pub const XPATH_1_0_DIALECT: &str = "http://www.w3.org/TR/1999/REC-xpath-19991116";

/// Filter languages this manager accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterDialect {
    XPath10,
}

impl FilterDialect {
    pub const SUPPORTED: &'static [FilterDialect] = &[FilterDialect::XPath10];

    pub fn uri(&self) -> &'static str {
        match self {
            FilterDialect::XPath10 => XPATH_1_0_DIALECT,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::SUPPORTED
            .iter()
            .copied()
            .find(|dialect| dialect.uri() == uri.trim())
    }

    /// Dialect-specific syntax check.
    fn check(&self, expression: &str) -> std::result::Result<(), String> {
        match self {
            FilterDialect::XPath10 => xpath::check(expression),
        }
    }
}

/// Accept or reject a requested filter. `None` (no filtering) is always
/// acceptable.
pub fn validate_filter(filter: Option<&FilterSpec>) -> Result<Option<FilterDialect>> {
    let Some(filter) = filter else {
        return Ok(None);
    };

    let dialect = FilterDialect::from_uri(&filter.dialect)
        .ok_or_else(|| SubscriptionError::FilteringUnavailable(filter.dialect.clone()))?;

    dialect
        .check(&filter.expression)
        .map_err(|reason| SubscriptionError::CannotProcessFilter {
            dialect: filter.dialect.clone(),
            reason,
        })?;

    Ok(Some(dialect))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xpath(expression: &str) -> FilterSpec {
        FilterSpec::new(XPATH_1_0_DIALECT, expression)
    }

    #[test]
    fn test_no_filter_is_valid() {
        assert_eq!(validate_filter(None).unwrap(), None);
    }

    #[test]
    fn test_accepts_valid_xpath() {
        for expr in [
            "/",
            "//temperature[@unit='C'] > 30",
            "count(/event/item) = 2",
            "boolean(/a[b = \"x ] y\"])",
            "/ns:order[last()]/total",
            "*",
            "sum(//line/@amount) div count(//line) >= 10.5",
            "ancestor::batch[@id = $current]/child::*",
        ] {
            assert_eq!(
                validate_filter(Some(&xpath(expr))).unwrap(),
                Some(FilterDialect::XPath10),
                "{expr:?}"
            );
        }
    }

    #[test]
    fn test_unsupported_dialect() {
        let spec = FilterSpec::new("urn:example:sql", "SELECT 1");
        let err = validate_filter(Some(&spec)).unwrap_err();
        assert!(matches!(err, SubscriptionError::FilteringUnavailable(d) if d == "urn:example:sql"));
    }

    #[test]
    fn test_dialect_checked_before_expression() {
        let spec = FilterSpec::new("urn:example:other", "((((");
        assert!(matches!(
            validate_filter(Some(&spec)),
            Err(SubscriptionError::FilteringUnavailable(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_xpath() {
        for expr in [
            "",
            "   ",
            "/a[b",
            "/a]b[",
            "count(/a",
            "/a[@x='unterminated]",
            "/a[]",
            "/a/",
            "/a =",
            "| /b",
            "(/a]",
            "/a[@x=]",
            "a b c",
            "/a[1 +* 2]",
            "and",
            "/a/*/()",
        ] {
            let err = validate_filter(Some(&xpath(expr))).unwrap_err();
            assert!(
                matches!(err, SubscriptionError::CannotProcessFilter { .. }),
                "{expr:?} gave {err:?}"
            );
        }
    }
}
