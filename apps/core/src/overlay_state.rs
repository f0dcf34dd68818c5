#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationAction {
    ShowAndFocus,
    FocusExisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayState {
    visible: bool,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self { visible: true }
    }
}

impl OverlayState {
    pub fn hidden() -> Self {
        Self { visible: false }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Another launch asked this instance to come forward.
    pub fn on_activation(&mut self) -> ActivationAction {
        if !self.visible {
            self.visible = true;
            return ActivationAction::ShowAndFocus;
        }

        ActivationAction::FocusExisting
    }

    pub fn on_escape(&mut self) -> bool {
        if self.visible {
            self.visible = false;
            return true;
        }
        false
    }
}
