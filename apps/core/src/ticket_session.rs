use crate::action_executor::truncate_chars;
use crate::model::Row;
use crate::search::MultipartFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketEvent {
    TextEdited(String),
    Select(usize),
    Submit,
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketEffect {
    ShowRows(Vec<String>),
    SetText(String),
    Deliver(String),
    Close,
}

/// Event contract for the ticket box: a filtered candidate list whose chosen
/// text is delivered, truncated, to the previously focused window.
#[derive(Debug, Clone)]
pub struct TicketSession {
    rows: Vec<Row>,
    filter: MultipartFilter,
    text: String,
    visible: Vec<String>,
    max_ticket_len: usize,
    max_results: usize,
}

impl TicketSession {
    pub fn new(rows: Vec<Row>, max_ticket_len: usize, max_results: usize) -> Self {
        Self {
            rows,
            filter: MultipartFilter::new(),
            text: String::new(),
            visible: Vec::new(),
            max_ticket_len,
            max_results,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn visible_rows(&self) -> &[String] {
        &self.visible
    }

    pub fn ticket(&self) -> String {
        truncate_chars(&self.text, self.max_ticket_len)
    }

    pub fn handle(&mut self, event: TicketEvent) -> Vec<TicketEffect> {
        match event {
            TicketEvent::TextEdited(text) => {
                self.filter.set_filter_string(&text);
                self.text = text;
                self.refilter();
                vec![TicketEffect::ShowRows(self.visible.clone())]
            }
            TicketEvent::Select(position) => {
                let Some(text) = self.visible.get(position) else {
                    return Vec::new();
                };
                self.text = text.clone();
                vec![TicketEffect::SetText(self.text.clone())]
            }
            TicketEvent::Submit => {
                let ticket = self.ticket();
                tracing::info!(ticket = %ticket, "ticket");
                if ticket.is_empty() {
                    return vec![TicketEffect::Close];
                }
                vec![TicketEffect::Deliver(ticket), TicketEffect::Close]
            }
            TicketEvent::Escape => vec![TicketEffect::Close],
        }
    }

    fn refilter(&mut self) {
        self.visible = self
            .filter
            .filter(&self.rows, self.max_results)
            .into_iter()
            .map(|row| row.text.clone())
            .collect();
    }
}
