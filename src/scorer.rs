//! The scoring oracle seam.
//!
//! Any model that can report the average negative log-likelihood of a text
//! can back the annotator. Perplexity is `exp` of that average.

use crate::error::Result;

pub trait LanguageModel {
    /// Identifier recorded in `perplexityModel`.
    fn id(&self) -> &str;

    /// Mean negative log-likelihood (nats) per predicted token of `text`,
    /// scoring the sequence against itself.
    fn mean_nll(&self, text: &str) -> Result<f64>;
}

impl<M: LanguageModel + ?Sized> LanguageModel for Box<M> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn mean_nll(&self, text: &str) -> Result<f64> {
        (**self).mean_nll(text)
    }
}

/// Perplexity of `text` under `model`.
///
/// Blank text scores 0.0 and never reaches the model. A non-finite result
/// is reported as positive infinity.
pub fn perplexity<M: LanguageModel + ?Sized>(model: &M, text: &str) -> Result<f64> {
    if text.trim().is_empty() {
        return Ok(0.0);
    }
    let ppl = model.mean_nll(text)?.exp();
    if ppl.is_finite() {
        Ok(ppl)
    } else {
        Ok(f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    struct Fixed {
        nll: f64,
        calls: Cell<usize>,
    }

    impl Fixed {
        fn new(nll: f64) -> Self {
            Self {
                nll,
                calls: Cell::new(0),
            }
        }
    }

    impl LanguageModel for Fixed {
        fn id(&self) -> &str {
            "fixed"
        }

        fn mean_nll(&self, _text: &str) -> Result<f64> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.nll)
        }
    }

    struct Broken;

    impl LanguageModel for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        fn mean_nll(&self, _text: &str) -> Result<f64> {
            Err(Error::Tokenizer("no vocabulary".to_string()))
        }
    }

    #[test]
    fn test_blank_text_skips_model() {
        let model = Fixed::new(1.0);
        assert_eq!(perplexity(&model, "").unwrap(), 0.0);
        assert_eq!(perplexity(&model, " \n\t\u{3000}").unwrap(), 0.0);
        assert_eq!(model.calls.get(), 0);
    }

    #[test]
    fn test_exp_of_mean_nll() {
        let model = Fixed::new(2.0_f64.ln());
        let ppl = perplexity(&model, "wherefore art thou").unwrap();
        assert!((ppl - 2.0).abs() < 1e-12);
        assert_eq!(model.calls.get(), 1);
    }

    #[test]
    fn test_overflow_is_infinity() {
        let model = Fixed::new(1e6);
        assert_eq!(perplexity(&model, "x").unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_nan_is_infinity() {
        let model = Fixed::new(f64::NAN);
        assert_eq!(perplexity(&model, "x").unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_model_error_propagates() {
        assert!(perplexity(&Broken, "text").is_err());
    }

    #[test]
    fn test_boxed_model() {
        let model: Box<dyn LanguageModel> = Box::new(Fixed::new(0.0));
        assert_eq!(model.id(), "fixed");
        assert_eq!(perplexity(&model, "a").unwrap(), 1.0);
    }
}
