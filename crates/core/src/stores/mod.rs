mod supabase;

pub use supabase::{SupabaseStore, DEFAULT_CHUNKS_TABLE};
