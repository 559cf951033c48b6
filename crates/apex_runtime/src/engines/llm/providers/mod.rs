pub mod perplexity;

pub use perplexity::PerplexityProvider;
