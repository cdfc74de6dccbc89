//! Target record categories and the static per-category documentation
//! corpus the planner embeds into its prompt.
//!
//! The corpus is process-wide, read-only reference text. It describes each
//! category's common fields and phrasing so the model can route a free-text
//! question without inventing structure.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Deals,
    Contacts,
    Leads,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Deals, Category::Contacts, Category::Leads];

    /// Case-insensitive parse of a (possibly padded) category name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "deals" => Some(Self::Deals),
            "contacts" => Some(Self::Contacts),
            "leads" => Some(Self::Leads),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deals => "Deals",
            Self::Contacts => "Contacts",
            Self::Leads => "Leads",
        }
    }

    pub fn doc(&self) -> &'static str {
        match self {
            Self::Deals => DEALS_DOC,
            Self::Contacts => CONTACTS_DOC,
            Self::Leads => LEADS_DOC,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Complex,
}

impl Complexity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(Self::Simple),
            "complex" => Some(Self::Complex),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Complex => "complex",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The full corpus block embedded into the planner prompt.
pub fn corpus() -> String {
    let mut text = String::new();
    for category in Category::ALL {
        text.push_str(category.as_str());
        text.push_str(":\n");
        text.push_str(category.doc().trim());
        text.push_str("\n\n");
    }
    text
}

const DEALS_DOC: &str = "
The Deals category represents high-value opportunities in the sales
pipeline. Each deal record captures a potential business transaction linked
to a contact and an account, tracked from qualification through closing.

Key fields:
- Deal_Name: the title or subject of the opportunity.
- Amount: price or value of the deal.
- Stage: current status (Qualification, Proposal, Negotiation, Closed Won,
  Closed Lost).
- Closing_Date: expected date to finalize the deal.
- Owner: the sales rep handling the deal.
- Probability: likelihood of winning the deal.

Common phrasings: high-value opportunities, deals in a given stage, deals by
amount, deals closing soon, top opportunities, deals by probability, deals
by owner or account. Related terms: opportunities, pipeline deals, active
deals, closed deals, deal value, deal size.
";

const CONTACTS_DOC: &str = "
The Contacts category stores individual people involved in business
transactions: prospects, clients, and decision-makers at the accounts being
worked.

Key fields:
- First_Name and Last_Name: the person's name.
- Email and Phone: primary contact details.
- Account_Name: the organization the contact belongs to.
- Title: their role at that organization.
- Contact_Owner: the rep responsible for the relationship.

Common phrasings: contacts at a company, decision-makers, contacts by
title, people associated with an account or a deal. Related terms: people,
clients, customers, stakeholders, points of contact.
";

const LEADS_DOC: &str = "
The Leads category captures potential prospects who have shown interest but
are not yet qualified as contacts or deals. It is the entry point of the
sales pipeline; a qualified lead converts into a contact, account, and deal.

Key fields:
- Lead_Name: combination of first and last name.
- Company: the organization the lead is associated with.
- Email and Phone: primary contact details.
- Lead_Source: how the lead found the business (Website, Referral,
  Campaign).
- Lead_Status: stage in the pre-sales cycle (New, Contacted, Qualified).
- Industry, Annual_Revenue, No_of_Employees.
- Lead_Owner: the rep assigned to the lead.

Common phrasings: new leads, qualified leads, leads from a given source,
leads in an industry, high-potential leads. Related terms: prospects,
potential customers, hot leads, cold leads, lead conversion.
";

#[cfg(test)]
mod tests {
    use super::{corpus, Category, Complexity};

    #[test]
    fn category_parse_normalizes_case_and_padding() {
        assert_eq!(Category::parse("  deals "), Some(Category::Deals));
        assert_eq!(Category::parse("CONTACTS"), Some(Category::Contacts));
        assert_eq!(Category::parse("Leads"), Some(Category::Leads));
        assert_eq!(Category::parse("Accounts"), None);
    }

    #[test]
    fn default_category_is_deals_and_default_complexity_is_simple() {
        assert_eq!(Category::default(), Category::Deals);
        assert_eq!(Complexity::default(), Complexity::Simple);
    }

    #[test]
    fn complexity_parses_known_tags_only() {
        assert_eq!(Complexity::parse("Complex"), Some(Complexity::Complex));
        assert_eq!(Complexity::parse(" simple"), Some(Complexity::Simple));
        assert_eq!(Complexity::parse("hard"), None);
    }

    #[test]
    fn corpus_covers_every_category() {
        let text = corpus();
        for category in Category::ALL {
            assert!(text.contains(category.as_str()));
        }
    }
}
