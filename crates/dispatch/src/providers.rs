use ivr_core::Service;

pub const MENU_TEXT: &str = "Press 1 for balance. 2 for recharge. 3 for last transaction. 4 for loan info. 5 for an agent. 6 to update details. 7 to cancel. 9 to repeat this menu.";

pub const NOT_UNDERSTOOD_TEXT: &str = "Sorry, I didn't understand your request.";

/// Downstream domain that answers a routed digit with canned text.
pub trait ServiceProvider: Send + Sync {
    fn service(&self) -> Service;
    fn name(&self) -> &'static str;
    fn respond(&self, digit: char) -> Option<&str>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AccountServices;

impl ServiceProvider for AccountServices {
    fn service(&self) -> Service {
        Service::Account
    }

    fn name(&self) -> &'static str {
        "account-services"
    }

    fn respond(&self, digit: char) -> Option<&str> {
        match digit {
            '1' => Some("Your account balance is ₹500."),
            '2' => Some("Your recharge has been processed successfully. ₹100 has been added to your account."),
            '3' => Some("Your last transaction: ₹50 debited on Oct 3, 2025 for mobile recharge to +91-9876543210."),
            '4' => Some("Loan Information: Personal loan amount ₹25,000 | Outstanding: ₹18,500 | Next EMI: ₹2,500 due on Oct 15, 2025."),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AgentPlatform;

impl ServiceProvider for AgentPlatform {
    fn service(&self) -> Service {
        Service::Agent
    }

    fn name(&self) -> &'static str {
        "agent-platform"
    }

    fn respond(&self, digit: char) -> Option<&str> {
        match digit {
            '5' => Some("Connecting you to a live agent. Please hold while we transfer your call. Your estimated wait time is 2 minutes."),
            '6' => Some("Account details update: Please provide your new information. You can update your name, address, email, or phone number."),
            '7' => Some("Action cancelled successfully. Your transaction has been terminated. You will be redirected to the main menu."),
            _ => None,
        }
    }
}

pub fn not_understood_reply() -> String {
    format!("{NOT_UNDERSTOOD_TEXT} {MENU_TEXT}")
}
