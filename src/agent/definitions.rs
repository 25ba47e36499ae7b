//! Built-in customer service agent definitions.

use super::client::CreateAgentRequest;
use crate::config::{ENV_AGENT_ID_BASELINE, ENV_AGENT_ID_V2};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Query used to smoke-test a freshly created agent.
pub const SMOKE_QUERY: &str = "What are your business hours?";

/// Queries for the automated smoke test.
pub const SMOKE_TEST_QUERIES: &[&str] = &[
    "What are your business hours?",
    "How can I reset my password?",
    "Tell me about your return policy.",
    "What payment methods do you accept?",
    "How do I track my order?",
    "Can you help me find a product?",
    "What is the warranty on your products?",
    "How do I contact customer support?",
    "Do you offer international shipping?",
    "How can I apply a discount code?",
];

const BASELINE_INSTRUCTIONS: &str = r#"You are a helpful and friendly customer service agent for TechMart, an e-commerce company.

Your responsibilities:
- Assist customers with order inquiries and tracking
- Provide information about products, policies, and services
- Help with account-related questions
- Guide customers through processes like returns, shipping, and payments
- Answer questions about business hours and contact options

Guidelines:
- Always be polite, professional, and empathetic
- Listen carefully to customer needs and ask clarifying questions
- Use the knowledge base below to provide accurate information
- Keep responses clear, concise, and conversational
- If you don't have specific information, acknowledge it and offer alternatives

KNOWLEDGE BASE (Use this information to answer customer questions):

**Business Hours:**
- Monday-Friday: 9:00 AM - 8:00 PM EST
- Saturday: 10:00 AM - 6:00 PM EST
- Sunday: 12:00 PM - 5:00 PM EST
- Holidays: Closed

**Sample Orders (for demo purposes):**
- Order ORD-12345: Status: Shipped, Tracking: TRK789XYZ, Expected Delivery: Oct 25, 2025
- Order ORD-67890: Status: Processing, Expected to Ship: Oct 22, 2025
- Order ORD-54321: Status: Delivered, Delivered on: Oct 18, 2025

**Return Policy:**
- Standard Return Window: 30 days from delivery
- Electronics: 14 days, must be unopened
- Clothing: 60 days with tags attached
- Final Sale Items: Non-returnable
- Refund Method: Original payment method within 5-7 business days
- Return Shipping: Free for defective items, $7.99 for other returns

**Common Questions:**
- Password Reset: Visit account settings, click 'Forgot Password', enter email, follow reset link
- Payment Methods: Visa, Mastercard, Amex, Discover, PayPal, Apple Pay, Google Pay
- International Shipping: Available to 50+ countries, 7-14 business days, cost calculated at checkout
- Discount Codes: Enter at checkout in 'Promo Code' field before payment
- Product Warranty: 1-year manufacturer warranty on electronics, 90-day on accessories
- Contact Support: Phone: 1-800-555-0123, Email: support@company.com, Live Chat: 24/7

When customers ask questions, use the knowledge base above to provide helpful, natural responses.
"#;

const CONCISE_INSTRUCTIONS: &str = r#"You are a helpful customer service agent for an e-commerce company. Your goal is to assist customers with their questions efficiently and professionally.

**Personality:** Friendly, professional, and concise. Provide direct answers without excessive elaboration.

**Business Hours:**
- Mon-Fri: 9:00 AM - 8:00 PM EST
- Sat: 10:00 AM - 6:00 PM EST
- Sun: 12:00 PM - 5:00 PM EST

**Sample Orders:**
- Order ORD-12345: Shipped, Tracking: TRK789XYZ, Delivery: Oct 25, 2025
- Order ORD-67890: Processing, Ships: Oct 22, 2025
- Order ORD-54321: Delivered on Oct 18, 2025

**Return Policy:**
- 30 days for most items, 14 days for electronics
- Clothing: 60 days with tags
- Free returns on defects, $7.99 otherwise

**Quick Answers:**
- Password Reset: Account settings → Forgot Password → Email link
- Payment: Visa, MC, Amex, Discover, PayPal, Apple/Google Pay
- International Shipping: 50+ countries, 7-14 days
- Support: 1-800-555-0123, support@company.com, 24/7 chat
- Warranty: 1-year electronics, 90-day accessories

Provide helpful, concise responses using the information above.
"#;

/// Which built-in agent to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AgentVariant {
    /// Knowledge-embedded baseline agent
    Baseline,
    /// Lower-temperature variant tuned for short answers
    Concise,
}

impl AgentVariant {
    /// `.env` key the created agent id is stored under.
    pub fn env_key(self) -> &'static str {
        match self {
            AgentVariant::Baseline => ENV_AGENT_ID_BASELINE,
            AgentVariant::Concise => ENV_AGENT_ID_V2,
        }
    }

    /// Comment written above a freshly appended `.env` entry.
    pub fn env_comment(self) -> &'static str {
        match self {
            AgentVariant::Baseline => "Customer Service Agent",
            AgentVariant::Concise => "Customer Service Agent V2 (Variant)",
        }
    }

    pub fn definition(self) -> AgentDefinition {
        match self {
            AgentVariant::Baseline => AgentDefinition::baseline(),
            AgentVariant::Concise => AgentDefinition::concise(),
        }
    }
}

/// Everything needed to create an agent except the model deployment.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: &'static str,
    pub instructions: &'static str,
    pub temperature: f32,
    pub top_p: f32,
    pub metadata: BTreeMap<String, String>,
    pub tools: Vec<Value>,
}

impl AgentDefinition {
    pub fn baseline() -> Self {
        Self {
            name: "customer-service-agent",
            instructions: BASELINE_INSTRUCTIONS,
            temperature: 0.7,
            top_p: 0.9,
            metadata: metadata(&[
                ("version", "1.0.0"),
                ("created_by", "agent-eval create-agent"),
                ("purpose", "Customer service and support"),
                ("environment", "development"),
            ]),
            tools: Vec::new(),
        }
    }

    pub fn concise() -> Self {
        Self {
            name: "customer-service-agent-v2",
            instructions: CONCISE_INSTRUCTIONS,
            temperature: 0.5,
            top_p: 0.85,
            metadata: metadata(&[
                ("version", "2.0.0"),
                ("created_by", "agent-eval create-agent"),
                ("purpose", "Customer service variant for comparison"),
                ("environment", "development"),
                ("variant", "concise"),
            ]),
            tools: Vec::new(),
        }
    }

    /// Attach the declarative customer service function tools.
    pub fn with_tools(mut self) -> Self {
        self.tools = customer_service_tools();
        self
    }

    /// Build the creation request for a model deployment.
    pub fn to_request(&self, model: &str) -> CreateAgentRequest {
        CreateAgentRequest {
            model: model.to_string(),
            name: self.name.to_string(),
            instructions: self.instructions.to_string(),
            tools: self.tools.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            metadata: self.metadata.clone(),
        }
    }
}

fn metadata(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Function tool declarations. The agent answers from its instructions; the
/// descriptions carry the demo data.
pub fn customer_service_tools() -> Vec<Value> {
    vec![
        function_tool(
            "get_order_status",
            "Get the current status and tracking information for a customer order.\n\n\
             Sample data for demo:\n\
             - Order ORD-12345: Status: Shipped, Tracking: TRK789XYZ, Delivery: Oct 25, 2025\n\
             - Order ORD-67890: Status: Processing, Expected Ship: Oct 22, 2025\n\
             - Order ORD-54321: Status: Delivered, Delivered on: Oct 18, 2025\n\n\
             Return format: Order status, tracking number, and expected/actual delivery date.",
            json!({
                "type": "object",
                "properties": {
                    "order_id": {
                        "type": "string",
                        "description": "The unique order identifier (e.g., ORD-12345)"
                    }
                },
                "required": ["order_id"]
            }),
        ),
        function_tool(
            "get_business_hours",
            "Get the current business hours for customer support.\n\n\
             - Monday-Friday: 9:00 AM - 8:00 PM EST\n\
             - Saturday: 10:00 AM - 6:00 PM EST\n\
             - Sunday: 12:00 PM - 5:00 PM EST\n\
             - Holidays: Closed",
            json!({
                "type": "object",
                "properties": {
                    "day_of_week": {
                        "type": "string",
                        "description": "Optional: Day of the week to check (Monday, Tuesday, etc.)"
                    }
                }
            }),
        ),
        function_tool(
            "get_return_policy",
            "Get information about the return and refund policy.\n\n\
             - Standard Return Window: 30 days from delivery\n\
             - Electronics: 14 days, must be unopened\n\
             - Clothing: 60 days with tags attached\n\
             - Final Sale Items: Non-returnable\n\
             - Refund Method: Original payment method within 5-7 business days\n\
             - Return Shipping: Free for defective items, $7.99 for other returns",
            json!({
                "type": "object",
                "properties": {
                    "product_category": {
                        "type": "string",
                        "description": "Optional: Category of product (electronics, clothing, etc.)"
                    }
                }
            }),
        ),
        function_tool(
            "search_knowledge_base",
            "Search the knowledge base for common customer questions and return the most \
             relevant article (password reset, order tracking, payment methods, international \
             shipping, discount codes, warranty, contact support).",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query (e.g., 'reset password', 'shipping', 'warranty')"
                    }
                },
                "required": ["query"]
            }),
        ),
    ]
}

fn function_tool(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}
