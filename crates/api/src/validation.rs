//! Request validation and sanitization for the order submission endpoint.
//!
//! The submission body arrives as an open JSON object; validation turns it
//! into fully-typed, normalized records or fails with a message that is
//! surfaced verbatim in the 400 response.

use chrono::{Datelike, Utc};
use domain::sanitize::{
    normalize_card_number, normalize_cpf, normalize_email, normalize_expiry_month, normalize_region,
    normalize_zip,
};
use domain::{AddressData, CustomerData, OrderItemRequest, PaymentData};
use serde::Deserialize;
use thiserror::Error;

/// A rejected submission; the message is the client-facing error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

fn invalid(message: impl Into<String>) -> ValidationError {
    ValidationError(message.into())
}

/// The submission body with every field optional, so presence checks
/// produce our own messages instead of serde's.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderRequestBody {
    customer_data: Option<RawCustomer>,
    items: Option<Vec<RawItem>>,
    payment_data: Option<RawPayment>,
    address_data: Option<RawAddress>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawCustomer {
    cpf: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawItem {
    id: Option<String>,
    quantity: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawPayment {
    card_number: Option<String>,
    card_holder_name: Option<String>,
    expiry_month: Option<i64>,
    expiry_year: Option<i64>,
    cvv: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAddress {
    street: Option<String>,
    number: Option<String>,
    complement: Option<String>,
    neighborhood: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    country: Option<String>,
}

/// A validated, sanitized submission ready to publish.
#[derive(Debug)]
pub struct OrderSubmission {
    pub customer_data: CustomerData,
    pub items: Vec<OrderItemRequest>,
    pub payment_data: PaymentData,
    pub address_data: AddressData,
}

/// Validates the submission body and normalizes every field.
pub fn validate_and_sanitize(body: serde_json::Value) -> Result<OrderSubmission, ValidationError> {
    let body: OrderRequestBody = serde_json::from_value(body)
        .map_err(|e| invalid(format!("Invalid request body: {e}")))?;

    let customer_data = validate_customer(body.customer_data)?;
    let items = validate_items(body.items)?;
    let payment_data = validate_payment(body.payment_data)?;
    let address_data = validate_address(body.address_data)?;

    Ok(OrderSubmission {
        customer_data,
        items,
        payment_data,
        address_data,
    })
}

fn validate_customer(raw: Option<RawCustomer>) -> Result<CustomerData, ValidationError> {
    let raw = raw.ok_or_else(|| invalid("customerData is required"))?;

    let cpf = normalize_cpf(&raw.cpf.unwrap_or_default())
        .ok_or_else(|| invalid("customerData.cpf must contain 11 digits"))?;

    let email = normalize_email(&raw.email.unwrap_or_default());
    let valid_email = matches!(
        email.split_once('@'),
        Some((local, domain)) if !local.is_empty() && domain.contains('.')
    );
    if !valid_email {
        return Err(invalid("customerData.email is invalid"));
    }

    let name = raw.name.unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return Err(invalid("customerData.name is required"));
    }

    Ok(CustomerData { cpf, email, name })
}

fn validate_items(raw: Option<Vec<RawItem>>) -> Result<Vec<OrderItemRequest>, ValidationError> {
    let raw = raw.unwrap_or_default();
    if raw.is_empty() {
        return Err(invalid("items must contain at least one item"));
    }

    let mut items = Vec::with_capacity(raw.len());
    for (index, item) in raw.into_iter().enumerate() {
        let id = item.id.unwrap_or_default().trim().to_string();
        if id.is_empty() {
            return Err(invalid(format!("items[{index}].id is required")));
        }
        let quantity = match item.quantity {
            Some(q) if q > 0 => q as u32,
            _ => {
                return Err(invalid(format!(
                    "items[{index}].quantity must be a positive integer"
                )));
            }
        };
        items.push(OrderItemRequest {
            id: id.into(),
            quantity,
        });
    }
    Ok(items)
}

fn validate_payment(raw: Option<RawPayment>) -> Result<PaymentData, ValidationError> {
    let raw = raw.ok_or_else(|| invalid("paymentData is required"))?;

    let card_number = normalize_card_number(&raw.card_number.unwrap_or_default());
    if card_number.len() != 16 || !card_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("paymentData.cardNumber must contain 16 digits"));
    }

    let card_holder_name = raw.card_holder_name.unwrap_or_default().trim().to_string();
    if card_holder_name.is_empty() {
        return Err(invalid("paymentData.cardHolderName is required"));
    }

    let month = match raw.expiry_month {
        Some(m) if (1..=12).contains(&m) => m as u32,
        _ => return Err(invalid("paymentData.expiryMonth must be between 1 and 12")),
    };

    let current_year = i64::from(Utc::now().year());
    let year = match raw.expiry_year {
        Some(y) if (current_year..=current_year + 10).contains(&y) => y,
        _ => {
            return Err(invalid(format!(
                "paymentData.expiryYear must be between {current_year} and {}",
                current_year + 10
            )));
        }
    };

    let cvv = raw.cvv.unwrap_or_default().trim().to_string();
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("paymentData.cvv must contain 3 or 4 digits"));
    }

    Ok(PaymentData {
        card_number,
        card_holder_name,
        expiry_month: normalize_expiry_month(month),
        expiry_year: year.to_string(),
        cvv,
    })
}

fn validate_address(raw: Option<RawAddress>) -> Result<AddressData, ValidationError> {
    let raw = raw.ok_or_else(|| invalid("addressData is required"))?;

    let required = |value: Option<String>, field: &str| -> Result<String, ValidationError> {
        let value = value.unwrap_or_default().trim().to_string();
        if value.is_empty() {
            return Err(invalid(format!("addressData.{field} is required")));
        }
        Ok(value)
    };

    let zip_code = normalize_zip(&raw.zip_code.unwrap_or_default())
        .ok_or_else(|| invalid("addressData.zipCode must match NNNNN-NNN"))?;

    Ok(AddressData {
        street: required(raw.street, "street")?,
        number: required(raw.number, "number")?,
        complement: raw
            .complement
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        neighborhood: required(raw.neighborhood, "neighborhood")?,
        city: required(raw.city, "city")?,
        state: normalize_region(&required(raw.state, "state")?),
        zip_code,
        country: normalize_region(&required(raw.country, "country")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> serde_json::Value {
        json!({
            "customerData": {
                "cpf": "123.456.789-01",
                "email": " Ana@Example.COM ",
                "name": " Ana Silva "
            },
            "items": [
                { "id": "p1", "quantity": 2 }
            ],
            "paymentData": {
                "cardNumber": "4111 1111 1111 1111",
                "cardHolderName": "ANA SILVA",
                "expiryMonth": 3,
                "expiryYear": Utc::now().year(),
                "cvv": "123"
            },
            "addressData": {
                "street": "Rua A",
                "number": "10",
                "neighborhood": "Centro",
                "city": "Sao Paulo",
                "state": " sp ",
                "zipCode": "01234567",
                "country": "br"
            }
        })
    }

    #[test]
    fn valid_body_is_fully_sanitized() {
        let submission = validate_and_sanitize(valid_body()).unwrap();

        assert_eq!(submission.customer_data.cpf, "12345678901");
        assert_eq!(submission.customer_data.email, "ana@example.com");
        assert_eq!(submission.customer_data.name, "Ana Silva");
        assert_eq!(submission.payment_data.card_number, "4111111111111111");
        assert_eq!(submission.payment_data.expiry_month, "03");
        assert_eq!(submission.address_data.state, "SP");
        assert_eq!(submission.address_data.country, "BR");
        assert_eq!(submission.address_data.zip_code, "01234-567");
        assert!(submission.address_data.complement.is_none());
        assert_eq!(submission.items[0].quantity, 2);
    }

    #[test]
    fn missing_customer_data_is_rejected() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("customerData");
        let error = validate_and_sanitize(body).unwrap_err();
        assert_eq!(error.to_string(), "customerData is required");
    }

    #[test]
    fn short_cpf_is_rejected() {
        let mut body = valid_body();
        body["customerData"]["cpf"] = json!("123");
        let error = validate_and_sanitize(body).unwrap_err();
        assert_eq!(error.to_string(), "customerData.cpf must contain 11 digits");
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut body = valid_body();
        body["items"][0]["quantity"] = json!(0);
        let error = validate_and_sanitize(body).unwrap_err();
        assert!(error.to_string().contains("positive integer"));
    }

    #[test]
    fn empty_items_are_rejected() {
        let mut body = valid_body();
        body["items"] = json!([]);
        let error = validate_and_sanitize(body).unwrap_err();
        assert_eq!(error.to_string(), "items must contain at least one item");
    }

    #[test]
    fn short_card_number_is_rejected() {
        let mut body = valid_body();
        body["paymentData"]["cardNumber"] = json!("4111 1111");
        let error = validate_and_sanitize(body).unwrap_err();
        assert!(error.to_string().contains("16 digits"));
    }

    #[test]
    fn expiry_month_out_of_range_is_rejected() {
        let mut body = valid_body();
        body["paymentData"]["expiryMonth"] = json!(13);
        let error = validate_and_sanitize(body).unwrap_err();
        assert!(error.to_string().contains("between 1 and 12"));
    }

    #[test]
    fn current_year_is_accepted_and_year_plus_eleven_rejected() {
        let current = Utc::now().year();

        let mut body = valid_body();
        body["paymentData"]["expiryYear"] = json!(current);
        assert!(validate_and_sanitize(body).is_ok());

        let mut body = valid_body();
        body["paymentData"]["expiryYear"] = json!(current + 11);
        let error = validate_and_sanitize(body).unwrap_err();
        assert!(error.to_string().contains("expiryYear"));
    }

    #[test]
    fn malformed_zip_is_rejected() {
        let mut body = valid_body();
        body["addressData"]["zipCode"] = json!("0123-4567");
        let error = validate_and_sanitize(body).unwrap_err();
        assert_eq!(
            error.to_string(),
            "addressData.zipCode must match NNNNN-NNN"
        );
    }

    #[test]
    fn bad_cvv_is_rejected() {
        for cvv in ["12", "12345", "12a"] {
            let mut body = valid_body();
            body["paymentData"]["cvv"] = json!(cvv);
            let error = validate_and_sanitize(body).unwrap_err();
            assert!(error.to_string().contains("cvv"));
        }
    }

    #[test]
    fn complement_is_optional_but_kept_when_present() {
        let mut body = valid_body();
        body["addressData"]["complement"] = json!(" apt 42 ");
        let submission = validate_and_sanitize(body).unwrap();
        assert_eq!(submission.address_data.complement.as_deref(), Some("apt 42"));
    }
}
