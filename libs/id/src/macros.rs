//! Macros for defining typed IDs and validated names.

/// Serde support through `Display` and `parse`, so every string form that
/// leaves the process can be read back with the same validation.
#[doc(hidden)]
#[macro_export]
macro_rules! impl_string_serde {
    ($name:ident) => {
        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

/// Defines a ULID-backed ID rendered as `{prefix}_{ulid}`.
///
/// ```ignore
/// define_id!(PassId, "pass");
///
/// let pass_id = PassId::new();
/// let parsed: PassId = "pass_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse()?;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::Ulid);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// A fresh ID.
            #[must_use]
            pub fn new() -> Self {
                Self($crate::Ulid::new())
            }

            #[must_use]
            pub const fn ulid(&self) -> $crate::Ulid {
                self.0
            }

            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                $crate::parse_prefixed(Self::PREFIX, s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        $crate::impl_string_serde!($name);
    };
}

/// Defines an operator-chosen name held to DNS-label rules.
///
/// The generated type can only be constructed through `parse()`, so any value
/// in hand is safe to splice into store keys and resource handles.
#[macro_export]
macro_rules! define_name {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            /// Used in error messages.
            pub const KIND: &'static str = $kind;

            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                $crate::validate_label(Self::KIND, s)?;
                Ok(Self(s.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        $crate::impl_string_serde!($name);
    };
}
