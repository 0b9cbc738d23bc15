//! Wire enums the engine reads or writes directly.
//!
//! The service sends and expects these as plain integers. Each type maps
//! to and from its wire number; unknown numbers map to `None`.

use serde::{Deserialize, Serialize};

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Maps a wire number to a variant.
            pub fn from_wire(value: i32) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// The number sent on the wire.
            pub fn wire(self) -> i32 {
                match self {
                    $(Self::$variant => $value,)+
                }
            }
        }

        impl From<$name> for serde_json::Value {
            fn from(value: $name) -> Self {
                serde_json::Value::from(value.wire())
            }
        }
    };
}

wire_enum! {
    /// Which client the server considers active for this account.
    pub enum ActiveClientState {
        NoActive = 0,
        IsActive = 1,
        OtherActive = 2,
    }
}

wire_enum! {
    pub enum TypingType {
        Started = 1,
        Paused = 2,
        Stopped = 3,
    }
}

wire_enum! {
    pub enum FocusType {
        Focused = 1,
        Unfocused = 2,
    }
}

wire_enum! {
    /// Per-conversation notification level.
    pub enum NotificationLevel {
        Quiet = 10,
        Ring = 30,
    }
}

wire_enum! {
    pub enum OffTheRecordStatus {
        OffTheRecord = 1,
        OnTheRecord = 2,
    }
}

wire_enum! {
    /// How a message is delivered.
    pub enum DeliveryMediumType {
        Unknown = 0,
        Babel = 1,
        GoogleVoice = 2,
        LocalSms = 3,
    }
}

wire_enum! {
    /// Kind of one chat message segment.
    pub enum SegmentType {
        Text = 0,
        LineBreak = 1,
        Link = 2,
    }
}

wire_enum! {
    /// `status` in every response header.
    pub enum ResponseStatus {
        Unknown = 0,
        Ok = 1,
        Busy = 2,
        UnexpectedError = 3,
        InvalidRequest = 4,
    }
}
