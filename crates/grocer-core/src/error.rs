//! # Error Types
//!
//! Domain-specific error types for grocer-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  grocer-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  grocer-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures + wrapped CoreError           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → (HTTP layer)            │
//! │                                                                         │
//! │  Every error classifies into an ErrorKind so the HTTP layer can pick   │
//! │  a status code without matching on individual variants.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of a failure.
///
/// | Kind            | Typical HTTP status |
/// |-----------------|---------------------|
/// | `Validation`    | 400                 |
/// | `NotFound`      | 404                 |
/// | `Conflict`      | 409                 |
/// | `Configuration` | 422                 |
/// | `Storage`       | 500                 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Configuration,
    Storage,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    ///
    /// ## When This Occurs
    /// - Product ID doesn't exist in the database
    /// - Settlement runs with `OnMissingProduct::Fail` and an item references
    ///   a deleted product
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Customer cannot be found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Discount rule cannot be found.
    #[error("Discount rule not found: {0}")]
    DiscountRuleNotFound(String),

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// The invoice number is already taken by another sale.
    #[error("Invoice number already exists: {0}")]
    DuplicateInvoice(String),

    /// Insufficient stock to complete a sale.
    ///
    /// Only raised when negative stock is disallowed by the settlement
    /// policy.
    ///
    /// ## User Workflow
    /// ```text
    /// Settle sale (RICE-5KG qty: 12)
    ///      │
    ///      ▼
    /// Decrement guarded by stock >= 12, available = 8
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "RICE-5KG", available: 8, requested: 12 }
    ///      │
    ///      ▼
    /// Whole sale rolled back
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: f64,
        requested: f64,
    },

    /// Customer does not hold enough points for the redemption.
    #[error("Insufficient points balance: available {available}, requested {requested}")]
    InsufficientPoints { available: f64, requested: i64 },

    /// Requested redemption is below the configured minimum.
    #[error("Minimum {minimum} points required for redemption, requested {requested}")]
    BelowMinimumRedemption { minimum: i64, requested: i64 },

    /// The loyalty program is switched off.
    #[error("Loyalty program is disabled")]
    LoyaltyDisabled,

    /// Loyalty settings are internally inconsistent.
    #[error("Invalid loyalty settings: {reason}")]
    InvalidSettings { reason: String },

    /// A guarded update lost against a concurrent writer.
    ///
    /// ## When This Occurs
    /// - Two terminals award points to the same customer at once and the
    ///   compare-and-swap on the lifetime total fails for one of them
    #[error("Concurrent update of {entity} {id}, retry the operation")]
    ConcurrentUpdate { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProductNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::DiscountRuleNotFound(_)
            | CoreError::SaleNotFound(_) => ErrorKind::NotFound,
            CoreError::DuplicateInvoice(_)
            | CoreError::InsufficientStock { .. }
            | CoreError::InsufficientPoints { .. }
            | CoreError::BelowMinimumRedemption { .. }
            | CoreError::ConcurrentUpdate { .. } => ErrorKind::Conflict,
            CoreError::LoyaltyDisabled | CoreError::InvalidSettings { .. } => {
                ErrorKind::Configuration
            }
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic or storage write runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed invoice number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::MustBePositive`].
    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::NotAllowed`].
    pub fn not_allowed(field: impl Into<String>, allowed: &[&str]) -> Self {
        ValidationError::NotAllowed {
            field: field.into(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            sku: "RICE-5KG".to_string(),
            available: 8.0,
            requested: 12.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for RICE-5KG: available 8, requested 12"
        );

        let err = CoreError::BelowMinimumRedemption {
            minimum: 10,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Minimum 10 points required for redemption, requested 5"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("sku").to_string(), "sku is required");
        assert_eq!(
            ValidationError::must_be_positive("quantity").to_string(),
            "quantity must be positive"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("items").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CoreError::CustomerNotFound("c1".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::DuplicateInvoice("INV-20240101-0001".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::InsufficientPoints {
                available: 5.0,
                requested: 10
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(CoreError::LoyaltyDisabled.kind(), ErrorKind::Configuration);
    }
}
