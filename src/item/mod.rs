/// This module provides the character-separated values reader and writer.
pub mod csv;
