//! `define_port_error!` declares the error enums of the ledger, object
//! store and message channel ports.
//!
//! Each variant gets a `thiserror` message and a snake-case constructor, so
//! adapters write `LedgerError::conflict(name)` or
//! `MessageChannelError::closed()` and the domain maps them onto
//! [`crate::domain::DomainError`] without knowing the backing system.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    define_port_error! {
        pub enum SamplePortError {
            Offline => "sample port is offline",
            Refused { reason: String } => "sample port refused: {reason}",
            Throttled { reason: String, retry_after: u32 } =>
                "sample port throttled ({retry_after}s): {reason}",
        }
    }

    #[test]
    fn unit_variants_get_constructors() {
        assert_eq!(SamplePortError::offline(), SamplePortError::Offline);
    }

    #[test]
    fn string_fields_accept_str() {
        let err = SamplePortError::refused("quota");
        assert_eq!(err.to_string(), "sample port refused: quota");
    }

    #[test]
    fn port_errors_use_generated_constructors() {
        use crate::domain::ports::{LedgerError, MessageChannelError};

        assert_eq!(
            LedgerError::conflict("groups_share_code_key").to_string(),
            "ledger write conflicted: groups_share_code_key"
        );
        assert_eq!(MessageChannelError::closed(), MessageChannelError::Closed);
    }

    #[test]
    fn mixed_fields_keep_their_types() {
        let err = SamplePortError::throttled("slow down", 30_u32);
        assert_eq!(err.to_string(), "sample port throttled (30s): slow down");
    }
}
