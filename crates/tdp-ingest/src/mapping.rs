//! Column mapping between source fields and canonical destination columns
//!
//! The mapping is a declared bijection built once per run: each canonical
//! column names at most one source column. Resolution against the header
//! happens exactly once, after which every row is addressed by precomputed
//! field index rather than by name.

use csv_async::StringRecord;
use tracing::warn;

use crate::coerce;
use crate::error::{IngestError, Result};
use crate::models::{CanonicalRecord, FieldValue};

/// Semantic kind of a canonical column, selecting its coercion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Decimal amount; empty or unparsable values become NULL.
    Amount,
    /// Date-time; unparsable values become NULL, valid ones are normalized
    /// to UTC.
    Timestamp,
    /// 0/1 flag; empty or unparsable values default to 0, never NULL.
    Flag,
    /// Categorical numeric code; only the integer prefix is kept.
    Code,
    /// Free text; passed through unchanged, absent fields become NULL.
    Text,
}

/// One (canonical column, source column) pair.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub canonical: &'static str,
    pub source: &'static str,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    const fn new(canonical: &'static str, source: &'static str, kind: ColumnKind) -> Self {
        Self {
            canonical,
            source,
            kind,
        }
    }
}

/// Ordered, immutable list of column pairs for one destination table.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    columns: Vec<ColumnSpec>,
}

impl ColumnMapping {
    /// The mapping for the `transactions` destination table.
    pub fn transactions() -> Self {
        use ColumnKind::*;

        let mapping = Self {
            columns: vec![
                ColumnSpec::new("transaction_id", "trans_num", Text),
                ColumnSpec::new("card_id", "cc_num", Text),
                ColumnSpec::new("occurred_at", "trans_date_trans_time", Timestamp),
                ColumnSpec::new("merchant_name", "merchant", Text),
                ColumnSpec::new("merchant_category_code", "mcc", Code),
                ColumnSpec::new("category", "category", Text),
                ColumnSpec::new("amount", "amt", Amount),
                ColumnSpec::new("state", "state", Text),
                ColumnSpec::new("is_fraud", "is_fraud", Flag),
                ColumnSpec::new("is_online", "online_order", Flag),
            ],
        };
        debug_assert!(mapping.is_bijection());
        mapping
    }

    /// Canonical column names in mapping order, as they appear in the
    /// destination INSERT.
    pub fn canonical_columns(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.canonical).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether no canonical or source column appears twice.
    fn is_bijection(&self) -> bool {
        let mut canonical: Vec<_> = self.columns.iter().map(|c| c.canonical).collect();
        let mut source: Vec<_> = self.columns.iter().map(|c| c.source).collect();
        canonical.sort_unstable();
        canonical.dedup();
        source.sort_unstable();
        source.dedup();
        canonical.len() == self.columns.len() && source.len() == self.columns.len()
    }

    /// Resolve every source column against the header, yielding a mapper
    /// that addresses rows by field index.
    ///
    /// A source column missing from the header resolves to "absent" for
    /// every row (logged once here). A header containing none of the mapped
    /// source columns is rejected: the file is not in the expected layout.
    pub fn resolve(&self, header: &StringRecord) -> Result<RowMapper> {
        let columns: Vec<ResolvedColumn> = self
            .columns
            .iter()
            .map(|spec| {
                let index = header.iter().position(|field| field == spec.source);
                if index.is_none() {
                    warn!(
                        source_column = spec.source,
                        canonical_column = spec.canonical,
                        "source column not present in header, every value will be absent"
                    );
                }
                ResolvedColumn {
                    kind: spec.kind,
                    index,
                }
            })
            .collect();

        if columns.iter().all(|c| c.index.is_none()) {
            return Err(IngestError::Mapping(
                "header contains none of the mapped source columns".to_string(),
            ));
        }

        Ok(RowMapper { columns })
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedColumn {
    kind: ColumnKind,
    index: Option<usize>,
}

/// Header-resolved mapper: converts one raw record into a canonical record.
///
/// Pure and order-preserving; coercion never fails, so neither does mapping.
#[derive(Debug, Clone)]
pub struct RowMapper {
    columns: Vec<ResolvedColumn>,
}

impl RowMapper {
    /// Map one raw record into a canonical record, applying each column's
    /// coercion rule by direct field index.
    pub fn map(&self, record: &StringRecord) -> CanonicalRecord {
        let values = self
            .columns
            .iter()
            .map(|column| {
                let raw = column.index.and_then(|i| record.get(i));
                match column.kind {
                    ColumnKind::Amount => FieldValue::Amount(coerce::amount(raw)),
                    ColumnKind::Timestamp => FieldValue::Timestamp(coerce::timestamp(raw)),
                    ColumnKind::Flag => FieldValue::Flag(coerce::flag(raw)),
                    ColumnKind::Code => FieldValue::Code(coerce::code(raw)),
                    ColumnKind::Text => FieldValue::Text(coerce::text(raw)),
                }
            })
            .collect();

        CanonicalRecord::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> StringRecord {
        StringRecord::from(vec![
            "trans_date_trans_time",
            "cc_num",
            "merchant",
            "category",
            "amt",
            "state",
            "mcc",
            "online_order",
            "is_fraud",
            "trans_num",
        ])
    }

    fn record() -> StringRecord {
        StringRecord::from(vec![
            "2023-01-05 10:00:00",
            "4642894980163913",
            "Quick Mart",
            "grocery_pos",
            "12.50",
            "NY",
            "5411.0",
            "",
            "1",
            "T0001",
        ])
    }

    #[test]
    fn test_transactions_mapping_is_bijection() {
        assert!(ColumnMapping::transactions().is_bijection());
    }

    #[test]
    fn test_resolve_binds_by_header_position() {
        let mapper = ColumnMapping::transactions().resolve(&header()).unwrap();
        let canonical = mapper.map(&record());

        assert_eq!(
            canonical.get(0),
            Some(&FieldValue::Text(Some("T0001".to_string())))
        );
        assert_eq!(
            canonical.get(4),
            Some(&FieldValue::Code(Some("5411".to_string())))
        );
        assert_eq!(canonical.get(8), Some(&FieldValue::Flag(1)));
        assert_eq!(canonical.get(9), Some(&FieldValue::Flag(0)));
    }

    #[test]
    fn test_mapping_is_deterministic_and_idempotent() {
        let mapper = ColumnMapping::transactions().resolve(&header()).unwrap();
        let first = mapper.map(&record());
        let second = mapper.map(&record());
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_source_column_maps_to_absent() {
        let partial = StringRecord::from(vec!["trans_num", "amt"]);
        let mapper = ColumnMapping::transactions().resolve(&partial).unwrap();
        let canonical = mapper.map(&StringRecord::from(vec!["T0001", "3.99"]));

        // Mapped columns resolve normally.
        assert_eq!(
            canonical.get(0),
            Some(&FieldValue::Text(Some("T0001".to_string())))
        );
        // Unmapped timestamp is NULL, unmapped flags still default to 0.
        assert_eq!(canonical.get(2), Some(&FieldValue::Timestamp(None)));
        assert_eq!(canonical.get(8), Some(&FieldValue::Flag(0)));
    }

    #[test]
    fn test_unrelated_header_is_rejected() {
        let unrelated = StringRecord::from(vec!["a", "b", "c"]);
        assert!(matches!(
            ColumnMapping::transactions().resolve(&unrelated),
            Err(IngestError::Mapping(_))
        ));
    }

    #[test]
    fn test_short_record_yields_defaults() {
        let mapper = ColumnMapping::transactions().resolve(&header()).unwrap();
        let canonical = mapper.map(&StringRecord::from(vec!["2023-01-05 10:00:00"]));

        // Field 0 is present; every field past the end of the record is
        // absent and falls back to the column default.
        assert!(matches!(
            canonical.get(2),
            Some(FieldValue::Timestamp(Some(_)))
        ));
        assert_eq!(canonical.get(1), Some(&FieldValue::Text(None)));
        assert_eq!(canonical.get(8), Some(&FieldValue::Flag(0)));
        assert_eq!(canonical.values().len(), 10);
    }
}
