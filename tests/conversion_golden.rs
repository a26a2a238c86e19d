//! Golden tests for conversion output
//!
//! Each case pins the exact bytes produced for a representative playbook so
//! that formatting, comments and quoting stay untouched around renamed keys.

use std::collections::HashMap;

use fqcn_converter::domain::{Converter, MappingStore, TaskListMode};

fn store() -> MappingStore {
    MappingStore::with_defaults(HashMap::new()).unwrap()
}

fn convert(input: &str, mode: TaskListMode) -> String {
    let store = store();
    Converter::new(&store).convert_text(input, mode).unwrap().content
}

// =============================================================================
// Playbooks
// =============================================================================

#[test]
fn golden_full_playbook() {
    let input = r#"---
# Web tier
- name: Configure web servers
  hosts: webservers
  become: yes
  vars:
    packages: [nginx, git]

  pre_tasks:
    - name: Update cache
      apt: update_cache=yes   # inline arguments

  tasks:
    - name: Install packages
      apt:
        name: "{{ item }}"
        state: present
      loop: "{{ packages }}"

    - name: Create app user
      user:
        name: deploy
        group: www-data
        shell: /bin/bash

    - name: Deploy config
      template:
        src: templates/app.conf.j2
        dest: /etc/app.conf
        mode: "0644"
      notify: Restart app
      when: ansible_os_family == "Debian"

  post_tasks:
    - debug:
        msg: done

  handlers:
    - name: Restart app
      systemd:
        name: app
        state: restarted
"#;

    let expected = r#"---
# Web tier
- name: Configure web servers
  hosts: webservers
  become: yes
  vars:
    packages: [nginx, git]

  pre_tasks:
    - name: Update cache
      ansible.builtin.apt: update_cache=yes   # inline arguments

  tasks:
    - name: Install packages
      ansible.builtin.apt:
        name: "{{ item }}"
        state: present
      loop: "{{ packages }}"

    - name: Create app user
      ansible.builtin.user:
        name: deploy
        group: www-data
        shell: /bin/bash

    - name: Deploy config
      ansible.builtin.template:
        src: templates/app.conf.j2
        dest: /etc/app.conf
        mode: "0644"
      notify: Restart app
      when: ansible_os_family == "Debian"

  post_tasks:
    - ansible.builtin.debug:
        msg: done

  handlers:
    - name: Restart app
      ansible.builtin.systemd:
        name: app
        state: restarted
"#;

    assert_eq!(convert(input, TaskListMode::Detect), expected);
}

#[test]
fn golden_blocks_and_action_shorthand() {
    let input = "\
- hosts: db
  tasks:
    - name: Guarded upgrade
      block:
        - name: Stop service
          service: name=postgresql state=stopped
        - action: yum name=postgresql-server state=latest
      rescue:
        - local_action: command /usr/bin/notify failure
      always:
        - service:
            name: postgresql
            state: started
";

    let expected = "\
- hosts: db
  tasks:
    - name: Guarded upgrade
      block:
        - name: Stop service
          ansible.builtin.service: name=postgresql state=stopped
        - action: ansible.builtin.yum name=postgresql-server state=latest
      rescue:
        - local_action: ansible.builtin.command /usr/bin/notify failure
      always:
        - ansible.builtin.service:
            name: postgresql
            state: started
";

    assert_eq!(convert(input, TaskListMode::Detect), expected);
}

#[test]
fn golden_role_task_file() {
    let input = "\
# roles/web/tasks/main.yml
- name: Open firewall
  ufw:
    rule: allow
    port: '443'

- include_tasks: users.yml

- name: Mount data volume
  mount:
    path: /data
    src: /dev/sdb1
    fstype: ext4
    state: mounted
";

    let expected = "\
# roles/web/tasks/main.yml
- name: Open firewall
  community.general.ufw:
    rule: allow
    port: '443'

- ansible.builtin.include_tasks: users.yml

- name: Mount data volume
  ansible.posix.mount:
    path: /data
    src: /dev/sdb1
    fstype: ext4
    state: mounted
";

    assert_eq!(convert(input, TaskListMode::Always), expected);
}

#[test]
fn golden_multi_document() {
    let input = "\
- hosts: a
  tasks:
    - ping:
---
- hosts: b
  tasks:
    - shell: uptime
...
";

    let expected = "\
- hosts: a
  tasks:
    - ansible.builtin.ping:
---
- hosts: b
  tasks:
    - ansible.builtin.shell: uptime
...
";

    assert_eq!(convert(input, TaskListMode::Detect), expected);
}

// =============================================================================
// Untouched Input
// =============================================================================

#[test]
fn golden_already_qualified_is_byte_identical() {
    let input = "\
- hosts: all
  tasks:
    - ansible.builtin.copy:   # keep
        src: a
        dest: b
    - community.general.system.ufw:
        rule: allow
";

    let store = store();
    let conversion = Converter::new(&store)
        .convert_text(input, TaskListMode::Detect)
        .unwrap();
    assert!(conversion.changes.is_empty());
    assert_eq!(conversion.content, input);
}

#[test]
fn golden_vars_file_is_untouched() {
    let input = "\
# group_vars/all.yml
copy:
  src: a
user: deploy
packages:
  - apt
  - yum
";

    assert_eq!(convert(input, TaskListMode::Detect), input);
}

#[test]
fn golden_parameter_named_like_module_is_kept() {
    let input = "\
- hosts: all
  tasks:
    - name: Add user
      user:
        name: alice
        group: admin
    - name: Add group
      group:
        name: admin
";

    let expected = "\
- hosts: all
  tasks:
    - name: Add user
      ansible.builtin.user:
        name: alice
        group: admin
    - name: Add group
      ansible.builtin.group:
        name: admin
";

    assert_eq!(convert(input, TaskListMode::Detect), expected);
}
