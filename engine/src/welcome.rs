//! Empty-state content shown before the first message.

/// Direct navigation shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAction {
    pub label: &'static str,
    pub path: &'static str,
}

pub const QUICK_ACTIONS: &[QuickAction] = &[
    QuickAction {
        label: "Services",
        path: "/services",
    },
    QuickAction {
        label: "Book Demo",
        path: "/demo",
    },
    QuickAction {
        label: "Careers",
        path: "/careers",
    },
    QuickAction {
        label: "Contact",
        path: "/contact",
    },
    QuickAction {
        label: "Why Us",
        path: "/why-us",
    },
];

/// Canned first messages; choosing one sends it as typed.
pub const CONVERSATION_STARTERS: &[&str] = &[
    "What services do you offer?",
    "Tell me about your accelerators",
    "How can I schedule a demo?",
    "What makes FDI different?",
];

#[cfg(test)]
mod tests {
    use super::QUICK_ACTIONS;
    use fdi_types::navigation::route_for_path;

    #[test]
    fn quick_actions_point_at_known_pages() {
        for action in QUICK_ACTIONS {
            assert!(route_for_path(action.path).is_some(), "{}", action.path);
        }
    }
}
