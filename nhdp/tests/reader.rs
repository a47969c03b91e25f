//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod common;

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use nhdp::db;
use nhdp::hysteresis::EwmaHysteresis;
use nhdp::instance::{Instance, LinkListener};
use nhdp::link::{Link, LinkStatus};
use nhdp::packet::consts::{ADDRTLV_LOCAL_IF, MSGTLV_IPV4_ORIGINATOR};
use nhdp::packet::{HelloMsg, Tlv, TlvBlock};
use nhdp::reader;

use crate::common::*;

#[derive(Debug, Default)]
struct RecordingListener {
    transitions: Arc<Mutex<Vec<(LinkStatus, LinkStatus)>>>,
}

impl LinkListener for RecordingListener {
    fn link_status_changed(&mut self, link: &Link, old: LinkStatus) {
        self.transitions.lock().unwrap().push((old, link.status));
    }
}

fn register_listener(instance: &mut Instance) -> Arc<Mutex<Vec<(LinkStatus, LinkStatus)>>> {
    let transitions = Arc::new(Mutex::new(Vec::new()));
    instance.listener_add(Box::new(RecordingListener {
        transitions: transitions.clone(),
    }));
    transitions
}

// The sender's own interface address, tagged the way every HELLO
// advertises it.
fn base_addrs() -> Vec<(nhdp_utils::addr::Addr, Vec<Tlv>)> {
    vec![(addr("10.0.0.1"), vec![this_if(), status_heard()])]
}

//
// End-to-end scenarios.
//

#[test]
fn first_contact() {
    let (mut instance, _clock) = test_instance(10_000);

    let msg = hello(6000, base_addrs());
    instance.process_hello(&ctx("10.0.0.1"), &msg).unwrap();

    assert_eq!(instance.arenas.neighbors.len(), 1);
    let link_idx = single_link(&instance, IF0);
    let link = &instance.arenas.links[link_idx];
    assert_eq!(link.status, LinkStatus::Heard);
    assert_eq!(link.rx_vtime, 6000);
    assert!(link.sym_timer.is_none());
    let heard = instance.state.timers.due(link.heard_timer.unwrap());
    assert_eq!(heard, Some(16_000));

    let naddr_idx = instance
        .state
        .neighbor_addrs
        .get_by_addr(&addr("10.0.0.1"))
        .unwrap();
    assert_eq!(
        instance.arenas.neighbor_addrs[naddr_idx].neighbor,
        link.neighbor
    );

    check_invariants(&instance);
}

#[test]
fn becoming_symmetric() {
    let (mut instance, clock) = test_instance(10_000);
    let transitions = register_listener(&mut instance);

    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, base_addrs()))
        .unwrap();
    clock.advance(2000);

    // The neighbor now lists this node's address as heard.
    let mut addrs = base_addrs();
    addrs.push((addr(IF0_ADDR), vec![status_heard()]));
    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, addrs))
        .unwrap();

    let link_idx = single_link(&instance, IF0);
    let link = &instance.arenas.links[link_idx];
    assert_eq!(link.status, LinkStatus::Symmetric);
    let sym = instance.state.timers.due(link.sym_timer.unwrap());
    assert_eq!(sym, Some(18_000));

    let nbr = &instance.arenas.neighbors[link.neighbor];
    assert_eq!(nbr.symmetric_links, 1);
    assert!(instance.arenas.interfaces.get_by_name(IF0).unwrap().flooding);

    assert_eq!(
        transitions.lock().unwrap().as_slice(),
        &[
            (LinkStatus::Pending, LinkStatus::Heard),
            (LinkStatus::Heard, LinkStatus::Symmetric),
        ]
    );

    check_invariants(&instance);
}

#[test]
fn link_loss() {
    let (mut instance, clock) = test_instance(10_000);

    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, base_addrs()))
        .unwrap();
    clock.advance(2000);
    let mut addrs = base_addrs();
    addrs.push((addr(IF0_ADDR), vec![status_heard()]));
    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, addrs))
        .unwrap();
    assert_eq!(link_status_on(&instance, IF0), LinkStatus::Symmetric);

    // The neighbor lost this node's address.
    clock.advance(2000);
    let mut addrs = base_addrs();
    addrs.push((addr(IF0_ADDR), vec![status_lost()]));
    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, addrs))
        .unwrap();

    let link_idx = single_link(&instance, IF0);
    let link = &instance.arenas.links[link_idx];
    assert_eq!(link.status, LinkStatus::Heard);
    assert!(link.sym_timer.is_none());

    check_invariants(&instance);
}

#[test]
fn identity_conflict_merges_neighbors() {
    let (mut instance, _clock) = test_instance(10_000);

    // Two distinct neighbors, learned through their own HELLOs.
    instance
        .process_hello(
            &ctx("10.0.0.1"),
            &hello(6000, vec![(addr("10.0.0.1"), vec![this_if()])]),
        )
        .unwrap();
    instance
        .process_hello(
            &ctx("10.0.0.2"),
            &hello(6000, vec![(addr("10.0.0.2"), vec![this_if()])]),
        )
        .unwrap();
    assert_eq!(instance.arenas.neighbors.len(), 2);

    // A third router claims both addresses as its other interfaces.
    instance
        .process_hello(
            &ctx("10.0.0.3"),
            &hello(
                6000,
                vec![
                    (addr("10.0.0.1"), vec![other_if()]),
                    (addr("10.0.0.2"), vec![other_if()]),
                ],
            ),
        )
        .unwrap();

    // Both old identities collapsed into the new neighbor.
    assert_eq!(instance.arenas.neighbors.len(), 1);
    let (nbr_idx, nbr) = instance.arenas.neighbors.iter().next().unwrap();
    assert_eq!(nbr.addrs.len(), 3);
    for text in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        let naddr_idx = instance
            .state
            .neighbor_addrs
            .get_by_addr(&addr(text))
            .unwrap();
        assert_eq!(instance.arenas.neighbor_addrs[naddr_idx].neighbor, nbr_idx);
    }
    assert_eq!(
        instance.arenas.interfaces.get_by_name(IF0).unwrap().links.len(),
        1
    );

    check_invariants(&instance);
}

#[test]
fn identity_conflict_reparents_adopted_link() {
    let (mut instance, _clock) = test_instance(10_000);

    instance
        .process_hello(
            &ctx("10.0.0.1"),
            &hello(6000, vec![(addr("10.0.0.1"), vec![this_if()])]),
        )
        .unwrap();
    instance
        .process_hello(
            &ctx("10.0.0.2"),
            &hello(6000, vec![(addr("10.0.0.2"), vec![this_if()])]),
        )
        .unwrap();
    let link_idx = instance
        .arenas
        .interfaces
        .get_by_name(IF0)
        .unwrap()
        .links[0];

    // The first router now also claims the second one's address: its
    // known link is adopted, but the neighbor identity is conflicted
    // and rebuilt from scratch.
    instance
        .process_hello(
            &ctx("10.0.0.1"),
            &hello(
                6000,
                vec![
                    (addr("10.0.0.1"), vec![this_if()]),
                    (addr("10.0.0.2"), vec![other_if()]),
                ],
            ),
        )
        .unwrap();

    assert_eq!(instance.arenas.neighbors.len(), 1);
    let (nbr_idx, nbr) = instance.arenas.neighbors.iter().next().unwrap();
    assert_eq!(nbr.addrs.len(), 2);
    assert_eq!(nbr.links, vec![link_idx]);
    assert_eq!(instance.arenas.links[link_idx].neighbor, nbr_idx);

    check_invariants(&instance);
}

#[test]
fn two_hop_insertion() {
    let (mut instance, clock) = test_instance(10_000);

    let mut addrs = base_addrs();
    addrs.push((addr(IF0_ADDR), vec![status_heard()]));
    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, addrs.clone()))
        .unwrap();

    clock.advance(1000);
    addrs.push((addr("10.0.0.99"), vec![other_neigh_symmetric()]));
    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, addrs))
        .unwrap();

    let link_idx = single_link(&instance, IF0);
    let link = &instance.arenas.links[link_idx];
    assert_eq!(link.two_hops.len(), 1);
    let th_idx = link.two_hops[&addr("10.0.0.99")];
    let two_hop = &instance.arenas.two_hops[th_idx];
    assert!(!two_hop.same_interface);
    let deadline = instance.state.timers.due(two_hop.vtime_timer.unwrap());
    assert_eq!(deadline, Some(17_000));

    check_invariants(&instance);
}

#[test]
fn lost_address_cascade() {
    let (mut instance, clock) = test_instance(10_000);

    // Neighbor with two addresses.
    instance
        .process_hello(
            &ctx("10.0.0.1"),
            &hello(
                6000,
                vec![
                    (addr("10.0.0.1"), vec![this_if()]),
                    (addr("10.0.0.2"), vec![this_if()]),
                ],
            ),
        )
        .unwrap();

    // A two-hop entry keyed by the address about to disappear.
    let link_idx = single_link(&instance, IF0);
    db::link_2hop_add(
        &mut instance.state,
        &mut instance.arenas,
        link_idx,
        addr("10.0.0.2"),
        20_000,
    );

    // The next HELLO omits 10.0.0.2.
    clock.advance(2000);
    instance
        .process_hello(
            &ctx("10.0.0.1"),
            &hello(6000, vec![(addr("10.0.0.1"), vec![this_if()])]),
        )
        .unwrap();

    let naddr_idx = instance
        .state
        .neighbor_addrs
        .get_by_addr(&addr("10.0.0.2"))
        .unwrap();
    let naddr = &instance.arenas.neighbor_addrs[naddr_idx];
    assert!(naddr.lost);
    let deadline = instance.state.timers.due(naddr.lost_timer.unwrap());
    assert_eq!(deadline, Some(18_000));

    let link = &instance.arenas.links[link_idx];
    assert!(link.two_hops.is_empty());
    assert!(!link.addrs.contains_key(&addr("10.0.0.2")));

    check_invariants(&instance);
}

//
// Properties.
//

#[test]
fn repeated_hello_is_idempotent() {
    let (mut instance, _clock) = test_instance(10_000);

    let mut addrs = base_addrs();
    addrs.push((addr(IF0_ADDR), vec![status_heard()]));
    addrs.push((addr("10.0.0.99"), vec![other_neigh_symmetric()]));
    let msg = hello(6000, addrs);

    instance.process_hello(&ctx("10.0.0.1"), &msg).unwrap();
    let first = snapshot(&instance);

    instance.process_hello(&ctx("10.0.0.1"), &msg).unwrap();
    let second = snapshot(&instance);

    assert_eq!(first, second);
    check_invariants(&instance);
}

#[test]
fn malformed_hello_leaves_database_untouched() {
    let (mut instance, _clock) = test_instance(10_000);

    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, base_addrs()))
        .unwrap();
    let before = snapshot(&instance);

    // Missing VALIDITY_TIME.
    let msg = HelloMsg::new(4, None, TlvBlock::default(), Vec::new());
    assert!(instance.process_hello(&ctx("10.0.0.1"), &msg).is_err());
    assert_eq!(snapshot(&instance), before);

    // Empty LOCAL_IF value on an address.
    let msg = hello(
        6000,
        vec![(
            addr("10.0.0.7"),
            vec![Tlv::new(ADDRTLV_LOCAL_IF, 0, Bytes::new())],
        )],
    );
    assert!(instance.process_hello(&ctx("10.0.0.7"), &msg).is_err());
    assert_eq!(snapshot(&instance), before);

    check_invariants(&instance);
}

#[test]
fn drop_after_pass1_releases_provisional_objects() {
    let (mut instance, _clock) = test_instance(10_000);
    let before = snapshot(&instance);

    let msg = hello(6000, base_addrs());
    let rx = ctx("10.0.0.1");
    let mut session = reader::message_tlvs(
        &mut instance,
        &rx,
        msg.addr_len,
        msg.originator,
        &msg.tlvs,
    )
    .unwrap();
    for (addr, tlvs) in &msg.addrs {
        reader::address_pass1(&mut instance, &mut session, addr, tlvs);
    }
    reader::pass1_end(&mut instance, &rx, &mut session, false);

    // Provisional neighbor, link and addresses exist now.
    assert_eq!(instance.arenas.neighbors.len(), 1);
    assert_eq!(instance.arenas.links.len(), 1);

    // The parser drops the message; pass 2 sees the dropped flag.
    reader::pass2_end(&mut instance, &mut session, true);

    assert_eq!(snapshot(&instance), before);
    assert!(instance.state.timers.is_empty());
    check_invariants(&instance);
}

//
// Domain data.
//

#[test]
fn willingness_mpr_and_metric_commit() {
    let (mut instance, clock) = test_instance(10_000);

    let mut addrs = base_addrs();
    addrs.push((addr(IF0_ADDR), vec![status_heard()]));
    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, addrs))
        .unwrap();
    assert_eq!(link_status_on(&instance, IF0), LinkStatus::Symmetric);

    clock.advance(1000);
    let mut addrs = base_addrs();
    addrs.push((
        addr(IF0_ADDR),
        vec![
            status_symmetric(),
            // Selected as flooding and routing MPR.
            mpr_tlv(0x03),
            // Incoming link and neighbor metric 1024.
            link_metric_tlv(0, [0xa2, 0x3f]),
        ],
    ));
    let msg = hello_with_tlvs(
        vec![vtime_tlv(6000), willingness_tlv(0x47)],
        addrs,
    );
    instance.process_hello(&ctx("10.0.0.1"), &msg).unwrap();

    let link_idx = single_link(&instance, IF0);
    let link = &instance.arenas.links[link_idx];
    let nbr = &instance.arenas.neighbors[link.neighbor];

    assert_eq!(nbr.flooding_willingness, 4);
    assert_eq!(nbr.domains[0].willingness, 7);
    assert!(nbr.domains[0].local_is_mpr);
    assert!(nbr.local_is_flooding_mpr);
    assert_eq!(link.domains[0].metric_out, 1024);
    assert_eq!(nbr.domains[0].metric_out, 1024);

    check_invariants(&instance);
}

//
// Originator and dualstack.
//

#[test]
fn originator_binding_follows_hellos() {
    let (mut instance, _clock) = test_instance(10_000);

    let mut msg = hello(6000, base_addrs());
    msg.originator = Some(addr("10.255.0.1"));
    instance.process_hello(&ctx("10.0.0.1"), &msg).unwrap();

    let link_idx = single_link(&instance, IF0);
    let nbr_idx = instance.arenas.links[link_idx].neighbor;
    assert_eq!(
        instance.arenas.neighbors[nbr_idx].originator,
        Some(addr("10.255.0.1"))
    );
    assert_eq!(
        instance.state.neighbors.get_by_originator(&addr("10.255.0.1")),
        Some(nbr_idx)
    );

    // A HELLO without an originator clears the binding.
    instance
        .process_hello(&ctx("10.0.0.1"), &hello(6000, base_addrs()))
        .unwrap();
    assert_eq!(instance.arenas.neighbors[nbr_idx].originator, None);

    check_invariants(&instance);
}

#[test]
fn dualstack_pairing() {
    let (mut instance, clock) = test_instance(10_000);

    // IPv4 side.
    let mut msg = hello(6000, base_addrs());
    msg.originator = Some(addr("10.255.0.4"));
    instance.process_hello(&ctx("10.0.0.1"), &msg).unwrap();
    let v4_link_idx = single_link(&instance, IF0);
    let v4_nbr_idx = instance.arenas.links[v4_link_idx].neighbor;

    // IPv6 side of the same router, advertising its IPv4 originator.
    clock.advance(500);
    let mut msg = HelloMsg::new(
        16,
        Some(addr("fe80::100")),
        TlvBlock::from(vec![
            vtime_tlv(6000),
            Tlv::new(
                MSGTLV_IPV4_ORIGINATOR,
                0,
                Bytes::copy_from_slice(&[10, 255, 0, 4]),
            ),
        ]),
        vec![(addr("fe80::1"), TlvBlock::from(vec![this_if()]))],
    );
    instance.process_hello(&ctx("fe80::1"), &msg).unwrap();

    let v6_naddr_idx = instance
        .state
        .neighbor_addrs
        .get_by_addr(&addr("fe80::1"))
        .unwrap();
    let v6_nbr_idx = instance.arenas.neighbor_addrs[v6_naddr_idx].neighbor;
    assert_ne!(v4_nbr_idx, v6_nbr_idx);
    assert_eq!(
        instance.arenas.neighbors[v6_nbr_idx].dualstack_partner,
        Some(v4_nbr_idx)
    );
    assert_eq!(
        instance.arenas.neighbors[v4_nbr_idx].dualstack_partner,
        Some(v6_nbr_idx)
    );
    let v6_link_idx = instance.arenas.neighbors[v6_nbr_idx].links[0];
    assert_eq!(
        instance.arenas.links[v6_link_idx].dualstack_partner,
        Some(v4_link_idx)
    );

    // An IPv6 HELLO without the IPv4 originator unpairs.
    clock.advance(500);
    msg.tlvs = TlvBlock::from(vec![vtime_tlv(6000)]);
    instance.process_hello(&ctx("fe80::1"), &msg).unwrap();
    assert_eq!(
        instance.arenas.neighbors[v6_nbr_idx].dualstack_partner,
        None
    );
    assert_eq!(
        instance.arenas.neighbors[v4_nbr_idx].dualstack_partner,
        None
    );

    check_invariants(&instance);
}

//
// Hysteresis.
//

#[test]
fn ewma_hysteresis_keeps_new_link_pending() {
    let (mut instance, clock) = test_instance(10_000);
    instance.hysteresis = Box::new(EwmaHysteresis::default());

    let mut addrs = base_addrs();
    addrs.push((addr(IF0_ADDR), vec![status_heard()]));
    let msg = hello(6000, addrs);

    let mut rounds = 0;
    loop {
        instance.process_hello(&ctx("10.0.0.1"), &msg).unwrap();
        rounds += 1;
        if link_status_on(&instance, IF0) != LinkStatus::Pending {
            break;
        }
        assert!(rounds < 100);
        clock.advance(100);
    }

    // 1 - 0.75^n crosses the accept threshold at the sixth HELLO.
    assert_eq!(rounds, 6);
    assert_eq!(link_status_on(&instance, IF0), LinkStatus::Symmetric);

    check_invariants(&instance);
}

//
// Consumer registration.
//

#[test]
fn consumer_templates_pass2_after_pass1() {
    let templates = reader::consumer_templates();
    assert_eq!(templates.len(), 4);
    assert!(templates[2].order > templates[0].order);
    assert!(templates[3].order > templates[1].order);
    assert!(templates[1].address_block);
    assert!(templates[3].address_block);
    // The mandatory VALIDITY_TIME filter.
    assert!(
        templates[0]
            .filters
            .iter()
            .any(|filter| filter.mandatory)
    );
}
