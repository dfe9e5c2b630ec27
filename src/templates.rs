use crate::models::Category;

pub struct Template {
    pub subject: &'static str,
    text: &'static str,
    html: &'static str,
}

impl Template {
    pub fn render_text(&self, first_name: &str) -> String {
        self.text.replace("{first_name}", first_name)
    }

    pub fn render_html(&self, first_name: &str) -> String {
        self.html.replace("{first_name}", first_name)
    }
}

pub fn for_category(category: Category) -> &'static Template {
    match category {
        Category::Inactive => &INACTIVE,
        Category::LowScore => &LOW_SCORE,
    }
}

static INACTIVE: Template = Template {
    subject: "We've missed you — pick up where you left off",
    text: "\
Hello {first_name},

We noticed you haven't logged into your learning dashboard in a while. Every
module you complete brings you closer to your goals.

Three quick steps to get back on track:
- Log in to your dashboard
- Continue from your last completed module
- Dedicate 30 minutes today

Keep pushing forward,
The Support Team
",
    html: "\
<html>
  <body>
    <h2>Hello {first_name},</h2>
    <p>We noticed you haven't logged into your learning dashboard in a while.
    Every module you complete brings you closer to your goals.</p>
    <ul>
      <li>Log in to your dashboard</li>
      <li>Continue from your last completed module</li>
      <li>Dedicate 30 minutes today</li>
    </ul>
    <p>Keep pushing forward,<br><strong>The Support Team</strong></p>
  </body>
</html>
",
};

static LOW_SCORE: Template = Template {
    subject: "Boost your scores and finish strong",
    text: "\
Hello {first_name},

Your recent performance shows some modules where your scores were lower than
expected. That's okay — learning is practice and persistence.

How to improve:
- Revisit the modules where your scores are low
- Review the knowledge base for extra guidance
- Attempt the practice tasks again

We believe in you,
The Support Team
",
    html: "\
<html>
  <body>
    <h2>Hello {first_name},</h2>
    <p>Your recent performance shows some modules where your scores were lower
    than expected. That's okay — learning is practice and persistence.</p>
    <ul>
      <li>Revisit the modules where your scores are low</li>
      <li>Review the knowledge base for extra guidance</li>
      <li>Attempt the practice tasks again</li>
    </ul>
    <p>We believe in you,<br><strong>The Support Team</strong></p>
  </body>
</html>
",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_first_name() {
        let template = for_category(Category::Inactive);
        assert!(template.render_text("Avery").starts_with("Hello Avery,"));
        assert!(template.render_html("Avery").contains("Hello Avery,"));
    }

    #[test]
    fn each_category_has_its_own_subject() {
        assert_ne!(
            for_category(Category::Inactive).subject,
            for_category(Category::LowScore).subject
        );
    }
}
