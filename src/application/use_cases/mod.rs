//! Use cases - Application business operations

pub mod checkout;

pub use checkout::CheckoutUseCase;
