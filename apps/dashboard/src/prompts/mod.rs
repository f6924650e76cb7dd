// System prompt editor: list, view and save the prompts the backend uses.
// The catalogue of known ids lives in models::prompt.

pub mod handlers;
