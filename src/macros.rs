/// Declares a closed set of manager wire tokens: field names such as
/// `ActionID`, or `Response` values such as `Success` and `Follows`.
///
/// Each variant is paired with its canonical spelling, which is what
/// `as_str()`, `Display` and `AsRef<str>` produce and what goes on the wire.
/// `FromStr` accepts any ASCII casing, because Asterisk itself mixes
/// `ActionID`/`ActionId` and `Complete`/`complete` between modules.
///
/// The macro also declares the parse error named after `parse_error:` (a
/// newtype over the rejected input, reported as `unknown <what>: <input>`)
/// and an `ALL` slice listing the variants in declaration order.
///
/// ```ignore
/// define_wire_enum! {
///     parse_error: ParseResponseStatusError => "response status",
///     /// Value of the `Response` field.
///     pub enum ResponseStatus {
///         Success => "Success",
///         Error => "Error",
///         Follows => "Follows",
///     }
/// }
///
/// assert_eq!("follows".parse(), Ok(ResponseStatus::Follows));
/// assert_eq!(ResponseStatus::Follows.as_str(), "Follows");
/// ```
macro_rules! define_wire_enum {
    (
        parse_error: $Err:ident => $what:literal,
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        #[doc = concat!("Error returned when parsing an unrecognized ", $what, ".")]
        #[derive(Debug, Clone, PartialEq, Eq)]
        $vis struct $Err(pub String);

        impl std::fmt::Display for $Err {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!("unknown ", $what, ": {}"), self.0)
            }
        }

        impl std::error::Error for $Err {}

        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$Name] = &[$( $Name::$variant ),+];

            /// Canonical spelling on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $Name::$variant => $wire, )+
                }
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|token| s.eq_ignore_ascii_case(token.as_str()))
                    .ok_or_else(|| $Err(s.to_string()))
            }
        }
    };
}
