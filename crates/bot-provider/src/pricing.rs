//! Per-model pricing tables, USD per million tokens. Used by the Gemini and
//! OpenAI adapters to stamp `Usage::cost_usd` after each call.

/// Price for one model, all figures USD per million tokens.
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub input: f64,
    pub cache_input: f64,
    pub output: f64,
}

const DEFAULT_GEMINI_PRICE: ModelPrice = ModelPrice {
    input: 0.15,
    cache_input: 0.0375,
    output: 0.60,
};

const DEFAULT_OPENAI_PRICE: ModelPrice = ModelPrice {
    input: 2.50,
    cache_input: 1.25,
    output: 10.00,
};

/// Resolve pricing for a Gemini model, falling back to the default flash
/// pricing for unrecognized models.
pub fn gemini_price(model: &str) -> ModelPrice {
    let m = model.split('/').next_back().unwrap_or(model);
    match m {
        s if s.starts_with("gemini-3-pro") => ModelPrice {
            input: 2.50,
            cache_input: 0.625,
            output: 15.00,
        },
        s if s.starts_with("gemini-3-flash") => ModelPrice {
            input: 0.20,
            cache_input: 0.05,
            output: 0.80,
        },
        s if s.starts_with("gemini-2.5-flash-lite") => ModelPrice {
            input: 0.05,
            cache_input: 0.0125,
            output: 0.20,
        },
        s if s.starts_with("gemini-2.5-flash") => ModelPrice {
            input: 0.15,
            cache_input: 0.0375,
            output: 0.60,
        },
        s if s.starts_with("gemini-2.5-pro") => ModelPrice {
            input: 1.25,
            cache_input: 0.3125,
            output: 10.00,
        },
        _ => DEFAULT_GEMINI_PRICE,
    }
}

/// Resolve pricing for an OpenAI model, falling back to the gpt-4o-class
/// default for unrecognized models.
pub fn openai_price(model: &str) -> ModelPrice {
    let m = model.split('/').next_back().unwrap_or(model);
    match m {
        s if s.starts_with("gpt-4o-mini") || s.starts_with("gpt-4.1-mini") => ModelPrice {
            input: 0.15,
            cache_input: 0.075,
            output: 0.60,
        },
        s if s.starts_with("gpt-4o") || s.starts_with("gpt-4.1") => ModelPrice {
            input: 2.50,
            cache_input: 1.25,
            output: 10.00,
        },
        s if s.starts_with("o4-mini") || s.starts_with("o3-mini") => ModelPrice {
            input: 1.10,
            cache_input: 0.55,
            output: 4.40,
        },
        _ => DEFAULT_OPENAI_PRICE,
    }
}

/// `(input - cached) * inputPrice + cached * cacheInputPrice + output * outputPrice`,
/// all divided by 1,000,000 since prices are per-million.
pub fn estimate_cost_usd(price: ModelPrice, input_tokens: u32, cached_tokens: u32, output_tokens: u32) -> f64 {
    let regular = input_tokens.saturating_sub(cached_tokens) as f64;
    let cached = cached_tokens as f64;
    let output = output_tokens as f64;
    (regular * price.input + cached * price.cache_input + output * price.output) / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_gemini_model_falls_back_to_default() {
        let p = gemini_price("gemini-99-ultra");
        assert_eq!(p.input, DEFAULT_GEMINI_PRICE.input);
    }

    #[test]
    fn cost_accounts_for_cached_discount() {
        let price = ModelPrice {
            input: 1.0,
            cache_input: 0.25,
            output: 2.0,
        };
        let cost = estimate_cost_usd(price, 1000, 400, 100);
        // (1000-400)*1.0 + 400*0.25 + 100*2.0 = 600 + 100 + 200 = 900 -> /1e6
        assert!((cost - 900.0 / 1_000_000.0).abs() < 1e-12);
    }
}
