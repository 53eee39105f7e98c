mod escrow;
mod support_desk;

pub use escrow::EscrowView;
pub use support_desk::SupportDeskView;
