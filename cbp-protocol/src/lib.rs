//! Wire codec, protocol state machine, and game primitives for the
//! Casino Blackjack Protocol. Pure value types and pure functions only:
//! no sockets, no locks, no async runtime. `cbp-server` and `cbp-client`
//! build their I/O and concurrency on top of this crate.

pub mod cards;
pub mod codec;
pub mod dfa;
pub mod error;
pub mod table_settings;

pub use cards::{hand_value, best_value, is_natural_blackjack, Card, Deck, Rank, Suit};
pub use codec::{CardHandEvent, Command, Holder, Response};
pub use dfa::{accepts, advance, State, Transition};
pub use error::ProtocolError;
pub use table_settings::TableSettings;

/// Protocol/service version this implementation advertises and expects
/// from clients during the VERSION handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default TCP/TLS service port.
pub const DEFAULT_SERVICE_PORT: u16 = 21210;

/// Default UDP discovery port.
pub const DEFAULT_DISCOVERY_PORT: u16 = 21211;

/// The UDP discovery probe payload clients send.
pub const DISCOVERY_PROBE: &[u8] = b"CBP\0";
