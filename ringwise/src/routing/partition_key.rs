use ringwise_cql::CqlValue;

use crate::errors::TokenCalculationError;

/// The values of a table's partition key columns, in the column order of
/// the table definition.
///
/// A key always has at least one component. Once built it is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionKey {
    components: Vec<CqlValue>,
}

impl PartitionKey {
    /// A key made of a single column.
    pub fn single(value: impl Into<CqlValue>) -> Self {
        Self {
            components: vec![value.into()],
        }
    }

    /// A key made of the given columns, in order.
    ///
    /// Fails with [`TokenCalculationError::EmptyPartitionKey`] if no values are given.
    pub fn new<I, V>(values: I) -> Result<Self, TokenCalculationError>
    where
        I: IntoIterator<Item = V>,
        V: Into<CqlValue>,
    {
        let components: Vec<CqlValue> = values.into_iter().map(Into::into).collect();
        if components.is_empty() {
            return Err(TokenCalculationError::EmptyPartitionKey);
        }
        Ok(Self { components })
    }

    /// The key's values, in column order.
    pub fn components(&self) -> &[CqlValue] {
        &self.components
    }

    /// Number of columns in the key.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the key spans more than one column.
    pub fn is_composite(&self) -> bool {
        self.components.len() > 1
    }
}

impl From<CqlValue> for PartitionKey {
    fn from(value: CqlValue) -> Self {
        PartitionKey::single(value)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ringwise_cql::CqlValue;

    use super::PartitionKey;
    use crate::errors::TokenCalculationError;

    #[test]
    fn empty_key_is_rejected() {
        assert_matches!(
            PartitionKey::new(Vec::<CqlValue>::new()),
            Err(TokenCalculationError::EmptyPartitionKey)
        );
    }

    #[test]
    fn component_order_is_preserved() {
        let key = PartitionKey::new([CqlValue::Int(1), CqlValue::Text("a".into())]).unwrap();
        assert!(key.is_composite());
        assert_eq!(key.components()[0], CqlValue::Int(1));
        assert_eq!(key.components()[1], CqlValue::Text("a".into()));
        assert!(!PartitionKey::single(5_i64).is_composite());
    }
}
