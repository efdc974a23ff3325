use crate::models::{Spark, SparkId, Stat};

/// Social proof figures shown on the landing page.
pub const STATS: &[Stat] = &[
    Stat { id: 1, name: "Waitlist Joined", value: "1K+", icon: "users" },
    Stat { id: 2, name: "Customer Rating", value: "4.9/5", icon: "star" },
    Stat { id: 3, name: "Bank-grade Security", value: "100%", icon: "shield" },
];

/// The candidate features visitors vote on.
pub const SPARKS: &[Spark] = &[
    Spark {
        id: SparkId(1),
        name: "Cashback to Savings",
        description: "Every dollar you spend earns cashback points, which are automatically \
                      deposited into your savings account to earn interest. It will spark your Savings!",
    },
    Spark {
        id: SparkId(2),
        name: "Wise Debt Management",
        description: "Debt is a part of modern life: credit cards, mortgages, and student loans can be \
                      valuable financial tools when managed wisely. However, mismanagement can result \
                      in challenges.",
    },
    Spark {
        id: SparkId(3),
        name: "Smart Spending Management",
        description: "Seal your spending leaks! For example, we uncover unnecessary subscriptions. Or \
                      automate bill payments, categorize spending into Want vs. Need.",
    },
    Spark {
        id: SparkId(4),
        name: "Cost Saving Notification",
        description: "Receive instant notifications on sales items as soon as you walk in to grocery \
                      stores in our partnership (and it earns more points too). Or when you drive into \
                      a random gas station, receive notifications about nearby gas stations offering \
                      cheaper prices.",
    },
];

/// Page anchors the navigation scrolls to.
pub const HERO_SECTION: &str = "hero-section";
pub const ABOUT_SECTION: &str = "about-section";
pub const SPARK_SECTION: &str = "spark-savings";
pub const COMMUNITY_SECTION: &str = "community-section";

pub fn spark(id: SparkId) -> Option<&'static Spark> {
    SPARKS.iter().find(|s| s.id == id)
}
