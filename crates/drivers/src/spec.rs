use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Informational,
}

/// Describes one property a driver accepts, for display and validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertySchema {
    pub key: String,
    pub display_name: String,
    pub description: String,
    pub placeholder: String,
    pub property_type: PropertyType,
    pub required: bool,
    pub secret: bool,
    pub hint: String,
}

impl PropertySchema {
    pub fn new(key: &str, display_name: &str, property_type: PropertyType) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            description: String::new(),
            placeholder: String::new(),
            property_type,
            required: false,
            secret: false,
            hint: String::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    pub fn hint(mut self, hint: &str) -> Self {
        self.hint = hint.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Capability and property descriptor reported by a driver.
///
/// The analyzer treats this as opaque and copies it into the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverSpec {
    pub display_name: String,
    pub description: String,
    pub config_properties: Vec<PropertySchema>,
    pub source_properties: Vec<PropertySchema>,
    pub implements_object_store: bool,
    pub implements_olap: bool,
    pub implements_notifier: bool,
}
