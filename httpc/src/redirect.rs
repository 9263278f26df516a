//! Redirect policy and chain tracking.
//!
//! The connection pool's `reqwest::Client` is built with
//! `redirect::Policy::none()` — redirects are followed manually here so
//! that the chain can be captured per top-level call and the per-request
//! `follow`/`max` overrides can differ from the client-wide config
//! without rebuilding the transport.

use reqwest::Url;

use crate::error::HttpcError;

pub const DEFAULT_MAX_REDIRECTS: u32 = crate::config::DEFAULT_MAX_REDIRECTS;

#[derive(Debug, Clone, Copy)]
pub struct RedirectPolicy {
    pub follow: bool,
    pub max: u32,
}

impl RedirectPolicy {
    pub fn effective_max(&self) -> u32 {
        if self.max == 0 {
            DEFAULT_MAX_REDIRECTS
        } else {
            self.max
        }
    }
}

/// Tracks the chain of URLs redirected FROM during one top-level call.
#[derive(Debug, Clone, Default)]
pub struct RedirectController {
    chain: Vec<String>,
}

pub enum Step {
    /// Not a redirect status, or `follow` is false — stop here.
    Done,
    /// Follow to `next_url`.
    Follow { next_url: Url },
}

impl RedirectController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn count(&self) -> usize {
        self.chain.len()
    }

    /// Evaluate one hop: `from_url` is the URL that was just requested,
    /// `status` and `location` come from its response.
    pub fn step(
        &mut self,
        policy: &RedirectPolicy,
        from_url: &Url,
        status: u16,
        location: Option<&str>,
    ) -> Result<Step, HttpcError> {
        if !(300..400).contains(&status) {
            return Ok(Step::Done);
        }
        if !policy.follow {
            return Ok(Step::Done);
        }
        let Some(location) = location else {
            return Ok(Step::Done);
        };

        if self.chain.len() as u32 >= policy.effective_max() {
            return Err(HttpcError::new(
                crate::error::ErrorKind::Transport,
                format!("stopped after {} redirects", policy.effective_max()),
            ));
        }

        let next_url = from_url.join(location).map_err(|e| {
            HttpcError::validation(format!("invalid redirect Location header: {e}"))
        })?;

        self.chain.push(from_url.to_string());
        Ok(Step::Follow { next_url })
    }
}
