//! Series definitions: a derived view over one series' components

use chronicle_core::{MAGIC_NAME_NR, MAGIC_SPARSITY_NR, MAGIC_TIME_DOMAIN_NR, MAGIC_TYPE_NR};

use crate::attribute::AttributeDefinition;

/// The components sharing one positive series number
#[derive(Debug, Clone)]
pub struct SeriesDefinition {
    number: u32,
    attributes: Vec<AttributeDefinition>,
}

impl SeriesDefinition {
    /// Collect the components of series `number`
    pub fn from_components<'a>(
        number: u32,
        components: impl IntoIterator<Item = &'a AttributeDefinition>,
    ) -> Self {
        let mut attributes: Vec<AttributeDefinition> = components
            .into_iter()
            .filter(|def| def.series_nr() == number)
            .cloned()
            .collect();
        attributes.sort_by_key(|def| def.number());
        Self { number, attributes }
    }

    /// Series number
    pub fn number(&self) -> u32 {
        self.number
    }

    fn value_of(&self, attribute_nr: u32) -> Option<&str> {
        self.attribute(attribute_nr).and_then(|def| def.value())
    }

    /// Component by attribute number
    pub fn attribute(&self, attribute_nr: u32) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|def| def.number() == attribute_nr)
    }

    /// All components, header first
    pub fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    /// Series name
    pub fn name(&self) -> Option<&str> {
        self.value_of(MAGIC_NAME_NR)
    }

    /// Series description
    pub fn description(&self) -> Option<&str> {
        self.attribute(MAGIC_NAME_NR).and_then(|def| def.description())
    }

    /// Value type of the observations
    pub fn value_type(&self) -> Option<&str> {
        self.value_of(MAGIC_TYPE_NR)
    }

    /// Time domain of the observations
    pub fn time_domain(&self) -> Option<&str> {
        self.value_of(MAGIC_TIME_DOMAIN_NR)
    }

    /// Sparsity flag, false when unset
    pub fn is_sparse(&self) -> bool {
        self.value_of(MAGIC_SPARSITY_NR) == Some("true")
    }

    /// True when the header is a tombstone
    pub fn is_erasing(&self) -> bool {
        self.attribute(MAGIC_NAME_NR)
            .map(|def| def.is_erasing())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erasing_header() {
        let components = [AttributeDefinition::erasing(2, MAGIC_NAME_NR)];
        let series = SeriesDefinition::from_components(2, components.iter());
        assert!(series.is_erasing());
        assert_eq!(series.name(), None);
        assert!(!series.is_sparse());
    }

    #[test]
    fn test_only_own_series_collected() {
        let components = [
            AttributeDefinition::new(1, MAGIC_TYPE_NR),
            AttributeDefinition::new(2, MAGIC_NAME_NR),
            AttributeDefinition::new(1, MAGIC_NAME_NR),
        ];
        let series = SeriesDefinition::from_components(1, components.iter());
        assert_eq!(series.attributes().len(), 2);
        assert_eq!(series.attributes()[0].number(), MAGIC_NAME_NR);
    }
}
