//! Process-wide attribute dictionary
//!
//! Attribute identifiers are resolved once at process start and referenced by
//! every session thereafter. The dictionary is immutable after construction:
//! the core never adds entries at runtime, and a required entry that is
//! missing is reported at startup rather than at use-time.

use std::collections::HashMap;

/// Opaque attribute identifier, valid for the dictionary that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrId(u32);

/// Attribute data types the core cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    /// Unsigned 32-bit integer
    U32,
    /// Raw octet string
    Octets,
    /// UTF-8 string
    String,
    /// Vendor-specific container
    Vsa,
}

/// Dictionary errors
#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("required attribute not in dictionary: {0}")]
    MissingAttribute(String),

    #[error("duplicate attribute definition: {0}")]
    DuplicateAttribute(String),
}

/// A single attribute definition
#[derive(Debug, Clone)]
pub struct AttrDef {
    name: String,
    attr_type: AttrType,
}

impl AttrDef {
    /// Attribute name as registered
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute data type
    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }
}

/// Immutable attribute registry
#[derive(Debug, Default)]
pub struct Dictionary {
    defs: Vec<AttrDef>,
    by_name: HashMap<String, AttrId>,
}

impl Dictionary {
    /// Create a dictionary builder
    pub fn builder() -> DictionaryBuilder {
        DictionaryBuilder {
            dict: Dictionary::default(),
            error: None,
        }
    }

    /// Look up an attribute by name
    pub fn find(&self, name: &str) -> Option<AttrId> {
        self.by_name.get(name).copied()
    }

    /// Look up an attribute by name, failing if it is absent
    ///
    /// Used during startup autoloading so that a missing entry aborts
    /// instantiation instead of surfacing mid-session.
    pub fn require(&self, name: &str) -> Result<AttrId, DictError> {
        self.find(name)
            .ok_or_else(|| DictError::MissingAttribute(name.to_string()))
    }

    /// Get the definition behind an identifier
    pub fn def(&self, id: AttrId) -> &AttrDef {
        &self.defs[id.0 as usize]
    }

    /// Number of registered attributes
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Builder collecting attribute definitions before the dictionary is frozen
pub struct DictionaryBuilder {
    dict: Dictionary,
    error: Option<DictError>,
}

impl DictionaryBuilder {
    /// Register an attribute definition
    pub fn attribute(mut self, name: impl Into<String>, attr_type: AttrType) -> Self {
        if self.error.is_some() {
            return self;
        }

        let name = name.into();
        if self.dict.by_name.contains_key(&name) {
            self.error = Some(DictError::DuplicateAttribute(name));
            return self;
        }

        let id = AttrId(self.dict.defs.len() as u32);
        self.dict.by_name.insert(name.clone(), id);
        self.dict.defs.push(AttrDef { name, attr_type });
        self
    }

    /// Freeze the dictionary
    pub fn build(self) -> Result<Dictionary, DictError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.dict),
        }
    }
}

/// Attribute names the TTLS module resolves at startup
pub mod names {
    pub const EAP_TLS_REQUIRE_CLIENT_CERT: &str = "EAP-TLS-Require-Client-Cert";
    pub const USER_NAME: &str = "User-Name";
    pub const USER_PASSWORD: &str = "User-Password";
    pub const EAP_MESSAGE: &str = "EAP-Message";
    pub const CHAP_CHALLENGE: &str = "CHAP-Challenge";
    pub const MS_CHAP_CHALLENGE: &str = "Vendor-Specific.Microsoft.CHAP-Challenge";
    pub const MS_CHAP2_SUCCESS: &str = "Vendor-Specific.Microsoft.CHAP2-Success";
    pub const REPLY_MESSAGE: &str = "Reply-Message";
    pub const EAP_CHANNEL_BINDING_MESSAGE: &str =
        "Vendor-Specific.UKERNA.EAP-Channel-Binding-Message";
    pub const VENDOR_SPECIFIC: &str = "Vendor-Specific";
}

/// Build a dictionary containing the standard attributes the module needs
pub fn builtin() -> Dictionary {
    Dictionary::builder()
        .attribute(names::EAP_TLS_REQUIRE_CLIENT_CERT, AttrType::U32)
        .attribute(names::USER_NAME, AttrType::String)
        .attribute(names::USER_PASSWORD, AttrType::String)
        .attribute(names::EAP_MESSAGE, AttrType::Octets)
        .attribute(names::CHAP_CHALLENGE, AttrType::Octets)
        .attribute(names::MS_CHAP_CHALLENGE, AttrType::Octets)
        .attribute(names::MS_CHAP2_SUCCESS, AttrType::Octets)
        .attribute(names::REPLY_MESSAGE, AttrType::String)
        .attribute(names::EAP_CHANNEL_BINDING_MESSAGE, AttrType::Octets)
        .attribute(names::VENDOR_SPECIFIC, AttrType::Vsa)
        .build()
        .expect("builtin dictionary has no duplicates")
}

/// Attribute identifiers resolved once at module instantiation
#[derive(Debug, Clone, Copy)]
pub struct WellKnown {
    /// Per-request client-certificate override
    pub require_client_cert: AttrId,
    pub user_name: AttrId,
    pub user_password: AttrId,
    pub eap_message: AttrId,
    pub reply_message: AttrId,
}

impl WellKnown {
    /// Resolve all well-known attributes, failing fast on any missing entry
    pub fn load(dict: &Dictionary) -> Result<Self, DictError> {
        Ok(WellKnown {
            require_client_cert: dict.require(names::EAP_TLS_REQUIRE_CLIENT_CERT)?,
            user_name: dict.require(names::USER_NAME)?,
            user_password: dict.require(names::USER_PASSWORD)?,
            eap_message: dict.require(names::EAP_MESSAGE)?,
            reply_message: dict.require(names::REPLY_MESSAGE)?,
        })
    }
}
