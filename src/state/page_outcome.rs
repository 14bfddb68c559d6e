/// Outcome definitions for dequeued URLs
///
/// Every URL a worker takes from the frontier ends in exactly one of these.
use std::fmt;

/// How the processing of one dequeued URL ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageOutcome {
    // ===== Fetched =====
    /// HTML page fetched, extracted and turned into a record
    Recorded,

    /// Page fetched but its Content-Type is not HTML
    NonHtml,

    /// Page redirected to a URL that was already visited
    DuplicateRedirect,

    // ===== Not fetched =====
    /// robots.txt disallows the URL for our user agent
    DisallowedByRobots,

    /// The page budget ran out before this URL could be dispatched
    BudgetExhausted,

    /// A redirect pointed outside the followed link scope
    RedirectOutOfScope,

    /// The run stopped before the request could start
    Cancelled,

    // ===== Errors =====
    /// Every attempt failed, or the failure was not retryable
    Failed,
}

impl PageOutcome {
    /// Returns true if a successful HTTP response was received for the page
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Recorded | Self::NonHtml | Self::DuplicateRedirect)
    }

    /// Returns true if this outcome counts as an error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if the URL was deliberately not fetched
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::DisallowedByRobots
                | Self::BudgetExhausted
                | Self::RedirectOutOfScope
                | Self::Cancelled
        )
    }

    /// Returns the outcome as a short label for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::NonHtml => "non_html",
            Self::DuplicateRedirect => "duplicate_redirect",
            Self::DisallowedByRobots => "disallowed_by_robots",
            Self::BudgetExhausted => "budget_exhausted",
            Self::RedirectOutOfScope => "redirect_out_of_scope",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_fetched() {
        assert!(PageOutcome::Recorded.is_fetched());
        assert!(PageOutcome::NonHtml.is_fetched());
        assert!(PageOutcome::DuplicateRedirect.is_fetched());

        assert!(!PageOutcome::DisallowedByRobots.is_fetched());
        assert!(!PageOutcome::BudgetExhausted.is_fetched());
        assert!(!PageOutcome::Failed.is_fetched());
    }

    #[test]
    fn test_is_error() {
        assert!(PageOutcome::Failed.is_error());
        assert!(!PageOutcome::Recorded.is_error());
        assert!(!PageOutcome::DisallowedByRobots.is_error());
    }

    #[test]
    fn test_is_skipped() {
        assert!(PageOutcome::DisallowedByRobots.is_skipped());
        assert!(PageOutcome::BudgetExhausted.is_skipped());
        assert!(PageOutcome::RedirectOutOfScope.is_skipped());
        assert!(PageOutcome::Cancelled.is_skipped());
        assert!(!PageOutcome::Cancelled.is_fetched());
        assert!(!PageOutcome::NonHtml.is_skipped());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PageOutcome::Recorded), "recorded");
        assert_eq!(
            format!("{}", PageOutcome::DisallowedByRobots),
            "disallowed_by_robots"
        );
    }
}
