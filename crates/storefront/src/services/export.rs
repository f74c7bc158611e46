//! Spreadsheet export of orders.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use thiserror::Error;

use crate::models::OrderListEntry;

/// Content type of the generated file.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Errors building the workbook.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("xlsx error: {0}")]
    Xlsx(#[from] XlsxError),
}

const COLUMNS: [(&str, f64); 13] = [
    ("Mã đơn", 10.0),
    ("Ngày đặt", 18.0),
    ("Khách hàng", 24.0),
    ("Email", 28.0),
    ("Số điện thoại", 16.0),
    ("Địa chỉ", 40.0),
    ("Trạng thái", 16.0),
    ("Thanh toán", 16.0),
    ("Mã giảm giá", 14.0),
    ("Tạm tính", 14.0),
    ("Giảm giá", 14.0),
    ("Phí vận chuyển", 14.0),
    ("Tổng cộng", 14.0),
];

/// Render orders as an `.xlsx` workbook, one row per order.
///
/// # Errors
///
/// Returns `ExportError::Xlsx` if the workbook cannot be written.
pub fn orders_workbook(orders: &[OrderListEntry]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Đơn hàng")?;

    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_background_color(0x00D9_E1F2);
    let money = Format::new().set_num_format("#,##0 \"₫\"");

    for (col, (title, width)) in (0u16..).zip(COLUMNS) {
        sheet.write_string_with_format(0, col, title, &header)?;
        sheet.set_column_width(col, width)?;
    }
    sheet.set_freeze_panes(1, 0)?;

    for (row, entry) in (1u32..).zip(orders) {
        let order = &entry.order;
        sheet.write_number(row, 0, f64::from(order.id.as_i32()))?;
        sheet.write_string(
            row,
            1,
            order.created_at.format("%d/%m/%Y %H:%M").to_string(),
        )?;
        sheet.write_string(row, 2, &order.recipient_name)?;
        sheet.write_string(row, 3, &entry.customer_email)?;
        sheet.write_string(row, 4, &order.phone)?;
        sheet.write_string(row, 5, &order.shipping_address)?;
        sheet.write_string(row, 6, order.status.label_vi())?;
        sheet.write_string(row, 7, order.payment_method.as_str())?;
        sheet.write_string(row, 8, order.coupon_code.as_deref().unwrap_or(""))?;

        let quote = &order.quote;
        for (col, amount) in [
            (9, quote.subtotal),
            (10, quote.discount),
            (11, quote.shipping_fee),
            (12, quote.total),
        ] {
            sheet.write_number_with_format(row, col, to_f64(amount), &money)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Whole-dong amounts fit an f64 exactly.
fn to_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

/// Download file name for an export taken at `now`.
#[must_use]
pub fn export_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("don-hang-{}.xlsx", now.format("%Y%m%d-%H%M%S"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};

    use senmarket_core::{OrderId, OrderStatus, PaymentMethod, Quote, UserId};

    use super::*;
    use crate::models::Order;

    fn entry(id: i32) -> OrderListEntry {
        let quote = Quote::from_stored(
            Decimal::from(500_000),
            Decimal::from(50_000),
            Decimal::from(30_000),
            Decimal::from(480_000),
        );
        let now = Utc.with_ymd_and_hms(2026, 3, 8, 9, 5, 1).unwrap();
        OrderListEntry {
            order: Order {
                id: OrderId::new(id),
                user_id: UserId::new(1),
                recipient_name: "Nguyễn Văn An".to_string(),
                phone: "0901234567".to_string(),
                shipping_address: "12 Lê Lợi, Quận 1, TP.HCM".to_string(),
                note: None,
                payment_method: PaymentMethod::Cod,
                status: OrderStatus::Pending,
                coupon_id: None,
                coupon_code: Some("TET2026".to_string()),
                formatted: quote.formatted(),
                quote,
                created_at: now,
                updated_at: now,
            },
            item_count: 2,
            customer_name: "An".to_string(),
            customer_email: "an@example.vn".to_string(),
        }
    }

    #[test]
    fn test_empty_export_is_a_zip() {
        let bytes = orders_workbook(&[]).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_export_with_rows() {
        let bytes = orders_workbook(&[entry(1), entry(2)]).unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert!(bytes.len() > orders_workbook(&[]).unwrap().len());
    }

    #[test]
    fn test_file_name() {
        let now = Utc.with_ymd_and_hms(2026, 3, 8, 9, 5, 1).unwrap();
        assert_eq!(export_file_name(now), "don-hang-20260308-090501.xlsx");
    }

    #[test]
    fn test_to_f64() {
        assert!((to_f64(Decimal::from(1_250_000)) - 1_250_000.0).abs() < f64::EPSILON);
    }
}
