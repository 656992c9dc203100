//! Uniform-cost поиск плана по библиотеке действий
//!
//! Поиск side-effect-free: работает на гипотетических копиях WorldState.
//! Детерминизм: стоимость в milli-единицах (u32), при равной стоимости
//! выигрывает узел, раскрытый раньше (действия раскрываются в порядке
//! объявления). "Плана нет" — это None, не ошибка: вызывающий падает
//! на дефолтное поведение состояния.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::actions::ActionDef;
use super::state::{satisfies, WorldState};

/// Максимальная длина плана
pub const MAX_PLAN_DEPTH: usize = 5;

struct Node {
    state: WorldState,
    actions: Vec<usize>,
}

fn milli(cost: f32) -> u32 {
    (cost * 1000.0).round() as u32
}

/// Найти самый дешёвый план из `start` к состоянию, удовлетворяющему
/// `goal`. Возвращает индексы действий в библиотеке.
/// Пустой план (`Some(vec![])`) — цель уже достигнута.
pub fn plan(
    start: &WorldState,
    goal: &[(super::state::WorldKey, bool)],
    library: &[ActionDef],
) -> Option<Vec<usize>> {
    if satisfies(start, goal) {
        return Some(Vec::new());
    }

    let mut nodes = vec![Node {
        state: start.clone(),
        actions: Vec::new(),
    }];
    // (cost, seq, node) — seq растёт в порядке раскрытия, даёт
    // стабильный tie-break при равной стоимости
    let mut frontier: BinaryHeap<Reverse<(u32, u64, usize)>> = BinaryHeap::new();
    frontier.push(Reverse((0, 0, 0)));

    let mut best_cost: HashMap<WorldState, u32> = HashMap::new();
    best_cost.insert(start.clone(), 0);

    let mut seq: u64 = 1;

    while let Some(Reverse((cost, _, node_idx))) = frontier.pop() {
        let depth = nodes[node_idx].actions.len();

        if satisfies(&nodes[node_idx].state, goal) {
            return Some(nodes[node_idx].actions.clone());
        }
        if depth >= MAX_PLAN_DEPTH {
            continue;
        }

        for (action_idx, action) in library.iter().enumerate() {
            if !satisfies(&nodes[node_idx].state, &action.preconditions) {
                continue;
            }

            let mut next_state = nodes[node_idx].state.clone();
            for &(key, value) in &action.effects {
                next_state.insert(key, value);
            }

            let next_cost = cost + milli(action.cost);
            if best_cost
                .get(&next_state)
                .map(|&known| known <= next_cost)
                .unwrap_or(false)
            {
                continue;
            }
            best_cost.insert(next_state.clone(), next_cost);

            let mut next_actions = nodes[node_idx].actions.clone();
            next_actions.push(action_idx);
            nodes.push(Node {
                state: next_state,
                actions: next_actions,
            });
            frontier.push(Reverse((next_cost, seq, nodes.len() - 1)));
            seq += 1;
        }
    }

    None
}
