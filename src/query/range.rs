//! Numeric range query.
//!
//! Indexed numeric fields are searched through their sortable terms: the
//! bounds are encoded like the field's values and the matching terms form a
//! contiguous slice of the dictionary. Segments where the field only exists
//! as a doc-value column are scanned instead.

use std::ops::Bound;

use crate::document::field_value::{FieldKind, NumericValue};
use crate::error::{Result, TesseraError};
use crate::index::numeric::{encode_f64, encode_i64};
use crate::query::matcher::{Combine, DisjunctionMatcher, DocValuesRangeMatcher, EmptyMatcher, Matcher};
use crate::query::query::{Query, SearchContext, validate_common};

/// Documents whose numeric field value lies within a range.
#[derive(Debug, Clone)]
pub struct NumericRangeQuery {
    field: String,
    lower: Bound<NumericValue>,
    upper: Bound<NumericValue>,
    boost: f32,
}

impl NumericRangeQuery {
    /// Create a range from explicit bounds; either end may be unbounded.
    pub fn new<S: Into<String>>(field: S, lower: Bound<NumericValue>, upper: Bound<NumericValue>) -> Self {
        NumericRangeQuery {
            field: field.into(),
            lower,
            upper,
            boost: 1.0,
        }
    }

    /// `low <= value <= high`.
    pub fn inclusive<S: Into<String>, N: Into<NumericValue>>(field: S, low: N, high: N) -> Self {
        Self::new(field, Bound::Included(low.into()), Bound::Included(high.into()))
    }

    /// Range with optional ends and per-end inclusiveness.
    pub fn with_bounds<S: Into<String>>(
        field: S,
        low: Option<NumericValue>,
        high: Option<NumericValue>,
        include_low: bool,
        include_high: bool,
    ) -> Self {
        let bound = |value: Option<NumericValue>, inclusive: bool| match value {
            Some(v) if inclusive => Bound::Included(v),
            Some(v) => Bound::Excluded(v),
            None => Bound::Unbounded,
        };
        Self::new(field, bound(low, include_low), bound(high, include_high))
    }

    /// Set the boost for this query.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Lower bound.
    pub fn lower(&self) -> Bound<NumericValue> {
        self.lower
    }

    /// Upper bound.
    pub fn upper(&self) -> Bound<NumericValue> {
        self.upper
    }

    /// Bounds as dictionary terms for a field of `kind`, or `None` when the
    /// range cannot match any value of that kind.
    fn term_bounds(&self, kind: FieldKind) -> Option<(Bound<String>, Bound<String>)> {
        match kind {
            FieldKind::Int32 | FieldKind::Int64 => {
                let lower = integer_bound(self.lower, true)?;
                let upper = integer_bound(self.upper, false)?;
                if let (Bound::Included(low), Bound::Included(high)) = (lower, upper) {
                    if low > high {
                        return None;
                    }
                }
                Some((lower.map(encode_i64), upper.map(encode_i64)))
            }
            FieldKind::Double => Some((
                self.lower.map(|v| encode_f64(v.as_f64())),
                self.upper.map(|v| encode_f64(v.as_f64())),
            )),
            _ => None,
        }
    }

    fn doc_values_matcher(&self, ctx: &SearchContext<'_>) -> Box<dyn Matcher> {
        Box::new(DocValuesRangeMatcher::new(
            ctx.segment().clone(),
            &self.field,
            self.lower,
            self.upper,
            ctx.doc_base(),
            self.boost,
            ctx.visits().clone(),
        ))
    }
}

/// Convert a bound to an integer bound over the same set of integers.
///
/// A fractional lower bound rounds up and a fractional upper bound rounds
/// down, both becoming inclusive. `None` means no integer satisfies it.
fn integer_bound(bound: Bound<NumericValue>, is_lower: bool) -> Option<Bound<i64>> {
    let value = match bound {
        Bound::Unbounded => return Some(Bound::Unbounded),
        Bound::Included(v) | Bound::Excluded(v) => v,
    };
    let inclusive = matches!(bound, Bound::Included(_));

    let v = match value {
        NumericValue::Int(v) => {
            return Some(if inclusive {
                Bound::Included(v)
            } else {
                Bound::Excluded(v)
            });
        }
        NumericValue::Float(v) => v,
    };

    if is_lower {
        if v < i64::MIN as f64 {
            return Some(Bound::Unbounded);
        }
        if v >= i64::MAX as f64 {
            return None;
        }
        if v.fract() == 0.0 {
            let v = v as i64;
            return Some(if inclusive {
                Bound::Included(v)
            } else {
                Bound::Excluded(v)
            });
        }
        Some(Bound::Included(v.ceil() as i64))
    } else {
        if v >= i64::MAX as f64 {
            return Some(Bound::Unbounded);
        }
        if v < i64::MIN as f64 {
            return None;
        }
        if v.fract() == 0.0 {
            let v = v as i64;
            return Some(if inclusive {
                Bound::Included(v)
            } else {
                Bound::Excluded(v)
            });
        }
        Some(Bound::Included(v.floor() as i64))
    }
}

impl Query for NumericRangeQuery {
    fn validate(&self) -> Result<()> {
        validate_common(Some(&self.field), self.boost)?;

        let value = |bound: &Bound<NumericValue>| match bound {
            Bound::Included(v) | Bound::Excluded(v) => Some(*v),
            Bound::Unbounded => None,
        };
        let (low, high) = (value(&self.lower), value(&self.upper));

        if low.is_some_and(|v| v.is_nan()) || high.is_some_and(|v| v.is_nan()) {
            return Err(TesseraError::query_parse(format!(
                "range on '{}' has a NaN bound",
                self.field
            )));
        }
        if let (Some(low), Some(high)) = (low, high) {
            if low > high {
                return Err(TesseraError::query_parse(format!(
                    "range on '{}' has lower bound {low} above upper bound {high}",
                    self.field
                )));
            }
        }
        Ok(())
    }

    fn matcher(&self, ctx: &SearchContext<'_>) -> Result<Box<dyn Matcher>> {
        let segment = ctx.segment();
        let dictionary = segment.dictionary();

        if !dictionary.has_field(&self.field) {
            if segment.doc_values_column(&self.field).is_some() {
                return Ok(self.doc_values_matcher(ctx));
            }
            return Ok(EmptyMatcher::boxed());
        }

        let Some(kind) = segment.field_kind(&self.field) else {
            return Ok(EmptyMatcher::boxed());
        };
        let Some((lower, upper)) = self.term_bounds(kind) else {
            return Ok(EmptyMatcher::boxed());
        };

        let terms = dictionary.range(
            &self.field,
            lower.as_ref().map(String::as_str),
            upper.as_ref().map(String::as_str),
        );

        let mut matchers = Vec::with_capacity(terms.len());
        for (term, info) in terms {
            matchers.push(ctx.posting_matcher(&self.field, &term.token, info, &self.field, self.boost)?);
        }

        Ok(match matchers.len() {
            0 => EmptyMatcher::boxed(),
            1 => matchers.remove(0),
            _ => Box::new(DisjunctionMatcher::new(matchers, Combine::Max)),
        })
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn set_boost(&mut self, boost: f32) {
        self.boost = boost;
    }

    fn description(&self) -> String {
        let low = match self.lower {
            Bound::Included(v) => format!("[{v}"),
            Bound::Excluded(v) => format!("{{{v}"),
            Bound::Unbounded => "[*".to_string(),
        };
        let high = match self.upper {
            Bound::Included(v) => format!("{v}]"),
            Bound::Excluded(v) => format!("{v}}}"),
            Bound::Unbounded => "*]".to_string(),
        };
        format!("{}:{low} TO {high}", self.field)
    }

    fn clone_box(&self) -> Box<dyn Query> {
        Box::new(self.clone())
    }

    fn field(&self) -> Option<&str> {
        Some(&self.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_bounds_rejected() {
        let query = NumericRangeQuery::inclusive("n", 10, 5);
        assert!(matches!(query.validate().unwrap_err(), TesseraError::QueryParse(_)));

        assert!(NumericRangeQuery::inclusive("n", 5, 5).validate().is_ok());
        assert!(NumericRangeQuery::inclusive("n", 1.5, 1.0).validate().is_err());
        assert!(NumericRangeQuery::inclusive("n", f64::NAN, 1.0).validate().is_err());
        assert!(
            NumericRangeQuery::with_bounds("n", None, Some(NumericValue::Int(3)), true, false)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_integer_bound_rounding() {
        let f = NumericValue::Float;
        assert_eq!(integer_bound(Bound::Included(f(2.5)), true), Some(Bound::Included(3)));
        assert_eq!(integer_bound(Bound::Excluded(f(2.5)), true), Some(Bound::Included(3)));
        assert_eq!(integer_bound(Bound::Included(f(2.5)), false), Some(Bound::Included(2)));
        assert_eq!(integer_bound(Bound::Excluded(f(-2.5)), false), Some(Bound::Included(-3)));
        assert_eq!(integer_bound(Bound::Excluded(f(4.0)), true), Some(Bound::Excluded(4)));
        assert_eq!(integer_bound(Bound::Included(f(1e30)), true), None);
        assert_eq!(integer_bound(Bound::Included(f(1e30)), false), Some(Bound::Unbounded));
    }

    #[test]
    fn test_empty_integer_window() {
        let query = NumericRangeQuery::inclusive("n", 2.2, 2.8);
        assert!(query.validate().is_ok());
        assert!(query.term_bounds(FieldKind::Int32).is_none());
        assert!(query.term_bounds(FieldKind::Text).is_none());
    }

    #[test]
    fn test_description() {
        let query =
            NumericRangeQuery::with_bounds("n", Some(NumericValue::Int(1)), None, false, true);
        assert_eq!(query.description(), "n:{1 TO *]");
    }
}
