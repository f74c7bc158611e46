//! Domain models for the storefront API.
//!
//! These are validated domain objects, separate from the private row types
//! in [`crate::db`]. All of them serialize to the JSON shapes the shop and
//! admin frontends consume.

pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod order;
pub mod otp;
pub mod review;
pub mod user;

use serde::Serialize;

use crate::db::PageRequest;

pub use cart::{CartLine, CartView, purchasable_lines};
pub use catalog::{
    Category, CategoryWithCount, Product, ProductFilter, ProductInput, ProductSort, slugify,
};
pub use coupon::{Coupon, CouponInput, normalize_code};
pub use order::{Order, OrderCustomer, OrderDetail, OrderItem, OrderListEntry};
pub use otp::OtpCode;
pub use review::Review;
pub use user::{ProfileUpdate, User};

/// One page of a listing plus paging metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// Paging metadata returned with every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(data: Vec<T>, total: i64, page: PageRequest) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            (total + page.per_page - 1) / page.per_page
        };

        Self {
            data,
            meta: PageMeta {
                current_page: page.page,
                per_page: page.per_page,
                total,
                last_page,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_page() {
        let page = PageRequest::new(Some(1), Some(12));
        assert_eq!(Paginated::<()>::new(vec![], 0, page).meta.last_page, 1);
        assert_eq!(Paginated::<()>::new(vec![], 12, page).meta.last_page, 1);
        assert_eq!(Paginated::<()>::new(vec![], 13, page).meta.last_page, 2);
    }
}
