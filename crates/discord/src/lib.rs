//! Discord interface for helperbot
//!
//! - **Interactions** (`interactions`) - gateway-independent event model, custom-id parsing
//! - **Messages** (`messages`) - reply templates with buttons and select menus
//! - **Registry** (`registry`) - handler traits and the name-keyed handler tables
//! - **Events** (`events`) - dispatcher that routes interactions and lifecycle events
//! - **Handlers** (`handlers`) - `/helper`, `/helpers`, `/ping`, `!helpers`, `!help`,
//!   the `lroles` menu, the `clearroles` button and the ready handler
//! - **Gateway** (`gateway`) - serenity client and type conversions
//!
//! # Architecture
//!
//! ```text
//! serenity events → GatewayHandler → EventDispatcher → HandlerRegistry → handlers
//!                                                                ↓
//!                           MessageTemplate reply ← HelperRepository / CacheStore
//! ```

pub mod events;
pub mod gateway;
pub mod handlers;
pub mod interactions;
pub mod messages;
pub mod registry;

pub use events::{EventContext, EventDispatcher, HandlerError, HandlerResult};
pub use gateway::{gateway_intents, run, GatewayError};
pub use handlers::default_registry;
pub use registry::HandlerRegistry;
