use crate::models::{ConversationWindow, Message};

/**
 * \brief 组装发送给 Provider 的消息窗口。
 * \param persona_prompt 人格提示词，作为唯一的 system 消息置于首位
 * \param history 按时间顺序的历史消息，仅保留最后 `max_history` 条
 * \param new_user_text 新消息，去除首尾空白后追加到末尾；调用方需保证非空
 * \param max_history 保留的历史条数上限
 *
 * 超出上限的历史直接丢弃，不提示调用方。
 */
pub fn build(
    persona_prompt: &str,
    history: &[Message],
    new_user_text: &str,
    max_history: usize,
) -> ConversationWindow {
    let skip = history.len().saturating_sub(max_history);
    let recent = &history[skip..];

    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(Message::system(persona_prompt));
    messages.extend(recent.iter().cloned());
    messages.push(Message::user(new_user_text.trim()));
    ConversationWindow::from_parts(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    const PERSONA: &str = "You are Amadeus.";

    fn turns(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("turn {}", i))
                } else {
                    Message::assistant(format!("turn {}", i))
                }
            })
            .collect()
    }

    #[test]
    fn test_window_length_is_bounded() {
        for h in 0..8 {
            for n in 0..8 {
                let window = build(PERSONA, &turns(h), "next", n);
                assert_eq!(window.len(), h.min(n) + 2, "h={} n={}", h, n);
            }
        }
    }

    #[test]
    fn test_first_is_persona_and_last_is_trimmed_input() {
        let window = build(PERSONA, &turns(3), "  who are you \n", 20);
        let first = &window.messages()[0];
        let last = window.messages().last().unwrap();
        assert_eq!(first.role, Role::System);
        assert_eq!(first.content, PERSONA);
        assert_eq!(window.persona(), PERSONA);
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "who are you");
    }

    #[test]
    fn test_short_history_kept_in_order() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let window = build(PERSONA, &history, "who are you", 20);
        assert_eq!(
            window.messages(),
            &[
                Message::system(PERSONA),
                Message::user("hi"),
                Message::assistant("hello"),
                Message::user("who are you"),
            ]
        );
    }

    #[test]
    fn test_long_history_drops_oldest() {
        let history = turns(25);
        let window = build(PERSONA, &history, "next", 20);
        assert_eq!(window.len(), 22);
        assert_eq!(&window.messages()[1..21], &history[5..]);
        assert_eq!(window.messages()[1].content, "turn 5");
        assert_eq!(window.messages()[20].content, "turn 24");
    }

    #[test]
    fn test_zero_limit_keeps_no_history() {
        let window = build(PERSONA, &turns(4), "next", 0);
        assert_eq!(
            window.messages(),
            &[Message::system(PERSONA), Message::user("next")]
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let history = turns(6);
        let a = build(PERSONA, &history, "again", 4);
        let b = build(PERSONA, &history, "again", 4);
        assert_eq!(a, b);
    }
}
