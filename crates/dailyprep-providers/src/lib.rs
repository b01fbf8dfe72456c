//! dailyprep-providers: hosted service integrations.
//!
//! Implements the `dailyprep-core` traits for Supabase (row store), Expo
//! (push), Gemini (answer evaluation), and Cloudinary (image hosting), plus
//! an in-memory store for tests.

pub mod cloudinary;
pub mod config;
pub mod expo;
pub mod gemini;
pub mod memory;
pub mod supabase;

pub use config::{
    create_evaluator, create_image_host, create_push_gateway, create_store, load_config,
    load_config_from, DailyprepConfig,
};
pub use memory::MemoryStore;
pub use supabase::SupabaseStore;
