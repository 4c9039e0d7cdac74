//! Kind-specific optional attributes and the per-kind key table.
//!
//! Each [`ItemKind`] owns a static list of [`Field`]s. The mapper walks that
//! list for both encoding and decoding, so the two record kinds share one
//! code path and a kind can never emit the other kind's exclusive keys.
//!
//! Every attribute is optional: `None` means "not present on the item",
//! which is a different state from a present falsy value such as
//! `is_invisible: Some(false)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::value::{Value, WireType, keys};

// ---------------------------------------------------------------------------
// Item kind
// ---------------------------------------------------------------------------

/// The vault schema an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Generic password item (`genp`).
    GenericCredential,
    /// Internet password item (`inet`).
    NetworkCredential,
}

impl ItemKind {
    /// The class discriminator value stored under [`keys::CLASS`].
    pub fn class(&self) -> &'static str {
        match self {
            Self::GenericCredential => "genp",
            Self::NetworkCredential => "inet",
        }
    }

    /// Parse a class discriminator value.
    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "genp" => Some(Self::GenericCredential),
            "inet" => Some(Self::NetworkCredential),
            _ => None,
        }
    }

    /// The optional attribute fields this kind carries, in key-table order.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Self::GenericCredential => GENERIC_FIELDS,
            Self::NetworkCredential => NETWORK_FIELDS,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenericCredential => f.write_str("generic credential"),
            Self::NetworkCredential => f.write_str("network credential"),
        }
    }
}

// ---------------------------------------------------------------------------
// Field table
// ---------------------------------------------------------------------------

/// An optional attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    AccessGroup,
    Description,
    Comment,
    Creator,
    ItemType,
    IsInvisible,
    IsNegative,
    Generic,
    Accessible,
    Server,
    Port,
    Protocol,
    AuthenticationType,
    Path,
    SecurityDomain,
}

const GENERIC_FIELDS: &[Field] = &[
    Field::AccessGroup,
    Field::Description,
    Field::Comment,
    Field::Creator,
    Field::ItemType,
    Field::IsInvisible,
    Field::IsNegative,
    Field::Generic,
    Field::Accessible,
];

const NETWORK_FIELDS: &[Field] = &[
    Field::Server,
    Field::Port,
    Field::Protocol,
    Field::AuthenticationType,
    Field::Path,
    Field::SecurityDomain,
];

impl Field {
    /// Provider key for this field.
    pub fn key(&self) -> &'static str {
        match self {
            Self::AccessGroup => keys::ACCESS_GROUP,
            Self::Description => keys::DESCRIPTION,
            Self::Comment => keys::COMMENT,
            Self::Creator => keys::CREATOR,
            Self::ItemType => keys::TYPE,
            Self::IsInvisible => keys::IS_INVISIBLE,
            Self::IsNegative => keys::IS_NEGATIVE,
            Self::Generic => keys::GENERIC,
            Self::Accessible => keys::ACCESSIBLE,
            Self::Server => keys::SERVER,
            Self::Port => keys::PORT,
            Self::Protocol => keys::PROTOCOL,
            Self::AuthenticationType => keys::AUTHENTICATION_TYPE,
            Self::Path => keys::PATH,
            Self::SecurityDomain => keys::SECURITY_DOMAIN,
        }
    }

    /// Wire type the provider stores this field as.
    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Creator | Self::ItemType => WireType::Number,
            Self::IsInvisible | Self::IsNegative => WireType::Bool,
            Self::Generic => WireType::Data,
            _ => WireType::String,
        }
    }

    fn mismatch(&self, value: &Value) -> VaultError {
        VaultError::AttributeTypeMismatch {
            key: self.key(),
            expected: self.wire_type(),
            found: value.wire_type(),
        }
    }

    fn string(&self, value: &Value) -> Result<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.mismatch(other)),
        }
    }

    fn number(&self, value: &Value) -> Result<u32> {
        match value {
            Value::Number(n) => u32::try_from(*n).map_err(|_| VaultError::InvalidAttribute {
                reason: format!("{} value {n} is not a 32-bit unsigned integer", self.key()),
            }),
            other => Err(self.mismatch(other)),
        }
    }

    fn boolean(&self, value: &Value) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(self.mismatch(other)),
        }
    }

    fn data(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Data(d) => Ok(d.clone()),
            other => Err(self.mismatch(other)),
        }
    }

    fn code<T>(&self, value: &Value, parse: fn(&str) -> Option<T>) -> Result<T> {
        let code = self.string(value)?;
        parse(&code).ok_or_else(|| VaultError::InvalidAttribute {
            reason: format!("unknown {} code {code:?}", self.key()),
        })
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Declares a string-coded enumeration with `code` / `from_code`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// The provider code stored for this value.
            pub fn code(&self) -> &'static str {
                match self {
                    $( Self::$variant => $code, )+
                }
            }

            /// Parse a provider code.
            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

wire_enum! {
    /// When the vault allows the item's secret to be read.
    pub enum Accessibility {
        WhenUnlocked => "ak",
        AfterFirstUnlock => "ck",
        Always => "dk",
        WhenPasscodeSetThisDeviceOnly => "akpu",
        WhenUnlockedThisDeviceOnly => "aku",
        AfterFirstUnlockThisDeviceOnly => "cku",
        AlwaysThisDeviceOnly => "dku",
    }
}

wire_enum! {
    /// Protocol of a network credential.
    pub enum InternetProtocol {
        Ftp => "ftp ",
        FtpAccount => "ftpa",
        Http => "http",
        Irc => "irc ",
        Nntp => "nntp",
        Pop3 => "pop3",
        Smtp => "smtp",
        Socks => "sox ",
        Imap => "imap",
        Ldap => "ldap",
        AppleTalk => "atlk",
        Afp => "afp ",
        Telnet => "teln",
        Ssh => "ssh ",
        Ftps => "ftps",
        Https => "htps",
        HttpProxy => "htpx",
        HttpsProxy => "htsx",
        FtpProxy => "ftpx",
        Smb => "smb ",
        Rtsp => "rtsp",
        RtspProxy => "rtsx",
        Daap => "daap",
        Eppc => "eppc",
        Ipp => "ipp ",
        Nntps => "ntps",
        Ldaps => "ldps",
        Telnets => "tels",
        Imaps => "imps",
        Ircs => "ircs",
        Pop3s => "pops",
    }
}

wire_enum! {
    /// Authentication scheme of a network credential.
    pub enum AuthenticationType {
        Ntlm => "ntlm",
        Msn => "msna",
        Dpa => "dpaa",
        Rpa => "rpaa",
        HttpBasic => "http",
        HttpDigest => "httd",
        HtmlForm => "form",
        Default => "dflt",
    }
}

// ---------------------------------------------------------------------------
// Attribute sets
// ---------------------------------------------------------------------------

/// Optional attributes of a generic credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericAttributes {
    pub access_group: Option<String>,
    pub description: Option<String>,
    pub comment: Option<String>,
    /// Four-character creator code.
    pub creator: Option<u32>,
    /// Four-character item type code.
    pub item_type: Option<u32>,
    pub is_invisible: Option<bool>,
    pub is_negative: Option<bool>,
    /// Caller-defined raw bytes.
    pub generic: Option<Vec<u8>>,
    pub accessible: Option<Accessibility>,
}

/// Optional attributes of a network credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkAttributes {
    pub server: Option<String>,
    /// Port number in its decimal string form, e.g. `"8080"`.
    pub port: Option<String>,
    pub protocol: Option<InternetProtocol>,
    pub authentication_type: Option<AuthenticationType>,
    pub path: Option<String>,
    pub security_domain: Option<String>,
}

/// The attribute set of a record, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
    Generic(GenericAttributes),
    Network(NetworkAttributes),
}

impl Attributes {
    /// An empty attribute set for `kind`.
    pub fn empty(kind: ItemKind) -> Self {
        match kind {
            ItemKind::GenericCredential => Self::Generic(GenericAttributes::default()),
            ItemKind::NetworkCredential => Self::Network(NetworkAttributes::default()),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Generic(_) => ItemKind::GenericCredential,
            Self::Network(_) => ItemKind::NetworkCredential,
        }
    }

    /// The wire value of `field`, `None` if unset or foreign to this kind.
    pub fn get(&self, field: Field) -> Option<Value> {
        match self {
            Self::Generic(a) => match field {
                Field::AccessGroup => a.access_group.clone().map(Value::from),
                Field::Description => a.description.clone().map(Value::from),
                Field::Comment => a.comment.clone().map(Value::from),
                Field::Creator => a.creator.map(Value::from),
                Field::ItemType => a.item_type.map(Value::from),
                Field::IsInvisible => a.is_invisible.map(Value::from),
                Field::IsNegative => a.is_negative.map(Value::from),
                Field::Generic => a.generic.clone().map(Value::from),
                Field::Accessible => a.accessible.map(|v| Value::from(v.code())),
                _ => None,
            },
            Self::Network(a) => match field {
                Field::Server => a.server.clone().map(Value::from),
                Field::Port => a.port.clone().map(Value::from),
                Field::Protocol => a.protocol.map(|v| Value::from(v.code())),
                Field::AuthenticationType => {
                    a.authentication_type.map(|v| Value::from(v.code()))
                }
                Field::Path => a.path.clone().map(Value::from),
                Field::SecurityDomain => a.security_domain.clone().map(Value::from),
                _ => None,
            },
        }
    }

    /// Decode `value` into `field`, checking its wire type.
    pub fn set(&mut self, field: Field, value: &Value) -> Result<()> {
        match self {
            Self::Generic(a) => match field {
                Field::AccessGroup => a.access_group = Some(field.string(value)?),
                Field::Description => a.description = Some(field.string(value)?),
                Field::Comment => a.comment = Some(field.string(value)?),
                Field::Creator => a.creator = Some(field.number(value)?),
                Field::ItemType => a.item_type = Some(field.number(value)?),
                Field::IsInvisible => a.is_invisible = Some(field.boolean(value)?),
                Field::IsNegative => a.is_negative = Some(field.boolean(value)?),
                Field::Generic => a.generic = Some(field.data(value)?),
                Field::Accessible => {
                    a.accessible = Some(field.code(value, Accessibility::from_code)?)
                }
                _ => return Err(foreign_field(field, ItemKind::GenericCredential)),
            },
            Self::Network(a) => match field {
                Field::Server => a.server = Some(field.string(value)?),
                Field::Port => a.port = Some(field.string(value)?),
                Field::Protocol => {
                    a.protocol = Some(field.code(value, InternetProtocol::from_code)?)
                }
                Field::AuthenticationType => {
                    a.authentication_type =
                        Some(field.code(value, AuthenticationType::from_code)?)
                }
                Field::Path => a.path = Some(field.string(value)?),
                Field::SecurityDomain => a.security_domain = Some(field.string(value)?),
                _ => return Err(foreign_field(field, ItemKind::NetworkCredential)),
            },
        }
        Ok(())
    }
}

impl From<GenericAttributes> for Attributes {
    fn from(a: GenericAttributes) -> Self {
        Self::Generic(a)
    }
}

impl From<NetworkAttributes> for Attributes {
    fn from(a: NetworkAttributes) -> Self {
        Self::Network(a)
    }
}

fn foreign_field(field: Field, kind: ItemKind) -> VaultError {
    VaultError::InvalidAttribute {
        reason: format!("{} is not an attribute of a {kind}", field.key()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_roundtrip() {
        for kind in [ItemKind::GenericCredential, ItemKind::NetworkCredential] {
            assert_eq!(ItemKind::from_class(kind.class()), Some(kind));
        }
        assert_eq!(ItemKind::from_class("cert"), None);
    }

    #[test]
    fn key_tables_are_disjoint() {
        let generic = ItemKind::GenericCredential.fields();
        let network = ItemKind::NetworkCredential.fields();
        assert!(generic.iter().all(|f| !network.contains(f)));
    }

    #[test]
    fn enum_codes_parse_back() {
        assert_eq!(InternetProtocol::Https.code(), "htps");
        assert_eq!(InternetProtocol::from_code("ssh "), Some(InternetProtocol::Ssh));
        assert_eq!(AuthenticationType::from_code("http"), Some(AuthenticationType::HttpBasic));
        assert_eq!(Accessibility::from_code("dk"), Some(Accessibility::Always));
        assert_eq!(Accessibility::from_code("zz"), None);
    }

    #[test]
    fn set_rejects_wrong_wire_type() {
        let mut attrs = Attributes::empty(ItemKind::GenericCredential);
        let err = attrs
            .set(Field::IsInvisible, &Value::from("false"))
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::AttributeTypeMismatch {
                key: "invi",
                expected: WireType::Bool,
                found: WireType::String,
            }
        ));
    }

    #[test]
    fn set_rejects_out_of_range_number() {
        let mut attrs = Attributes::empty(ItemKind::GenericCredential);
        let err = attrs.set(Field::Creator, &Value::Number(-1)).unwrap_err();
        assert!(matches!(err, VaultError::InvalidAttribute { .. }));
    }

    #[test]
    fn set_rejects_unknown_code() {
        let mut attrs = Attributes::empty(ItemKind::NetworkCredential);
        let err = attrs
            .set(Field::Protocol, &Value::from("gophr"))
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidAttribute { .. }));
    }

    #[test]
    fn set_rejects_foreign_field() {
        let mut attrs = Attributes::empty(ItemKind::NetworkCredential);
        let err = attrs.set(Field::Comment, &Value::from("x")).unwrap_err();
        assert!(matches!(err, VaultError::InvalidAttribute { .. }));
    }

    #[test]
    fn get_ignores_foreign_field() {
        let attrs = Attributes::Network(NetworkAttributes {
            server: Some("example.com".into()),
            ..Default::default()
        });
        assert_eq!(attrs.get(Field::Comment), None);
        assert_eq!(attrs.get(Field::Server), Some(Value::from("example.com")));
    }
}
