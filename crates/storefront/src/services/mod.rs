//! Business logic services for the shop API.
//!
//! # Services
//!
//! - `auth` - Registration, one-time codes, password and Google login, bearer tokens
//! - `email` - One-time code delivery over SMTP
//! - `google` - Google OAuth client
//! - `chatbot` - Gemini shopping assistant
//! - `orders` - Checkout and order status workflow
//! - `export` - Order spreadsheet export

pub mod auth;
pub mod chatbot;
pub mod email;
pub mod export;
pub mod google;
pub mod orders;
