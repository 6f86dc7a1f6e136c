/// Bill payments that can be made to earn puzzle pieces.
pub const PAYMENT_OPTIONS: [&str; 4] = [
    "Pay Gas Bill",
    "Electricity Bill",
    "Credit Card Payment",
    "UPI Recharge",
];

pub fn is_known_payment(name: &str) -> bool {
    PAYMENT_OPTIONS.contains(&name.trim())
}
